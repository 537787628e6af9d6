pub mod creative;
pub mod reasoning;
pub mod research;

pub use creative::CreativeAgent;
pub use reasoning::ReasoningAgent;
pub use research::{ResearchAgent, ResearchLimits};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref VIETNAMESE_DIACRITICS: Regex = Regex::new(
        "[àáãạảăắằẳẵặâấầẩẫậèéẹẻẽêềếểễệìíĩỉịòóõọỏôốồổỗộơớờởỡợùúũụủưứừửữựỳýỵỷỹđ]"
    )
    .expect("diacritic pattern is valid");
}

/// Lowercased query contains any of the keywords
fn contains_any(query_lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| query_lower.contains(keyword))
}

fn task_type_in(task_type: Option<&str>, accepted: &[&str]) -> bool {
    task_type.is_some_and(|t| accepted.contains(&t))
}

fn is_vietnamese(text: &str) -> bool {
    VIETNAMESE_DIACRITICS.is_match(&text.to_lowercase())
}

/// Collapse the indentation of multi-line prompt templates
fn dedent(template: &str) -> String {
    template
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
