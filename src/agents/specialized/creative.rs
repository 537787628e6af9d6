use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::{contains_any, dedent, task_type_in};
use crate::agents::{Agent, AgentOutput, Task};
use crate::providers::{CompletionRequest, GenerationOptions, LLMProvider};

const CREATIVE_KEYWORDS: &[&str] = &[
    "create", "write", "design", "generate", "story", "poem", "content", "creative", "innovative",
    "tạo", "viết", "thiết kế", "truyện", "thơ", "nội dung", "sáng tạo",
];

const CREATIVE_TASK_TYPES: &[&str] = &["creative", "content_generation"];

/// Mode keyword sets, checked in order; the first hit wins.
const MODE_KEYWORDS: &[(&str, &[&str])] = &[
    ("storyteller", &["story", "tell", "narrative", "fiction", "kể", "truyện"]),
    ("poet", &["poem", "poetry", "verse", "thơ", "bài thơ"]),
    ("marketer", &["marketing", "advertise", "promotion", "quảng cáo"]),
    ("visionary", &["vision", "future", "imagine", "tương lai", "tầm nhìn"]),
    ("designer", &["design", "visual", "layout", "thiết kế"]),
    ("innovator", &["innovate", "new idea", "concept", "idea", "ý tưởng", "sáng tạo"]),
];

const DEFAULT_MODE: &str = "content_creator";

/// Content generation, ideation and storytelling
pub struct CreativeAgent {
    name: String,
    description: String,
    provider: Arc<dyn LLMProvider>,
    options: GenerationOptions,
}

impl CreativeAgent {
    pub fn new(provider: Arc<dyn LLMProvider>, options: GenerationOptions) -> Self {
        Self {
            name: "Creative Agent".to_string(),
            description:
                "Specialized in creative writing, content generation, and innovative thinking"
                    .to_string(),
            provider,
            options,
        }
    }

    pub fn detect_mode(query: &str) -> &'static str {
        let query = query.to_lowercase();
        MODE_KEYWORDS
            .iter()
            .find(|(_, keywords)| contains_any(&query, keywords))
            .map(|(mode, _)| *mode)
            .unwrap_or(DEFAULT_MODE)
    }

    fn mode_description(mode: &str) -> &'static str {
        match mode {
            "storyteller" => "crafting engaging narratives and stories",
            "poet" => "composing expressive poetry and verse",
            "marketer" => "creating persuasive marketing and promotional content",
            "visionary" => "developing forward-thinking and innovative concepts",
            "designer" => "conceptualizing visual and design ideas",
            "innovator" => "generating novel solutions and inventive ideas",
            _ => "producing engaging general content across various formats",
        }
    }

    fn tone_description(tone: &str) -> &'static str {
        match tone {
            "formal" => "formal and professional",
            "casual" => "casual and conversational",
            "humorous" => "light-hearted and humorous",
            "serious" => "serious and thoughtful",
            "inspirational" => "uplifting and motivational",
            _ => "well-balanced and appropriate to the context",
        }
    }

    fn format_instructions(format: &str) -> &'static str {
        match format {
            "blog" => "Format your response as a blog post with a title, introduction, main sections with headings, and a conclusion.",
            "social" => "Format your response as a concise social media post, keeping it engaging and shareable.",
            "article" => "Format your response as a well-structured article with a headline, byline, introduction, body paragraphs, and conclusion.",
            "script" => "Format your response as a script or dialogue with character names and actions clearly indicated.",
            "bullet_points" => "Format your response as organized bullet points for easy scanning.",
            _ => "Use whatever format best suits the creative request.",
        }
    }

    fn system_prompt(mode: &str, style: &str, tone: &str) -> String {
        let style = if style.is_empty() {
            "versatile and adaptable to different contexts"
        } else {
            style
        };
        format!(
            "You are an expert creative assistant, specializing in {}.\n\
             Your creative style is {}.\n\
             Your tone should be {}.\n\n{}",
            Self::mode_description(mode),
            style,
            Self::tone_description(tone),
            dedent(
                "Approach creative tasks with originality, imagination, and attention to detail.
                Draw on diverse knowledge and perspectives to create compelling and engaging content."
            )
        )
    }
}

#[async_trait]
impl Agent for CreativeAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn evaluate_suitability(&self, task: &Task) -> Result<f64> {
        let query = task.query().to_lowercase();

        let score = if task_type_in(task.task_type(), CREATIVE_TASK_TYPES)
            || task.contains("creative_mode")
        {
            0.95
        } else if contains_any(&query, CREATIVE_KEYWORDS) {
            0.85
        } else {
            0.3
        };
        Ok(score)
    }

    async fn process(&self, task: &Task) -> Result<AgentOutput> {
        let query = task.query();
        let mode = task
            .get_str("creative_mode")
            .unwrap_or_else(|| Self::detect_mode(query))
            .to_string();
        let style = task.get_str("style").unwrap_or("").to_string();
        let tone = task.get_str("tone").unwrap_or("balanced").to_string();
        let format = task.get_str("format").unwrap_or("free");

        let user_prompt = format!(
            "Creative request: {}\n\n{}\n\nPlease provide your creative response.",
            query,
            Self::format_instructions(format)
        );

        let request = CompletionRequest::chat(
            self.options.model.clone(),
            Self::system_prompt(&mode, &style, &tone),
            user_prompt,
        )
        .with_sampling(&self.options);

        let response = self.provider.complete(request).await?;

        Ok(AgentOutput::new()
            .with("answer", response.content)
            .with("confidence", 0.85)
            .with("creative_mode", mode)
            .with("style", style)
            .with("tone", tone)
            .with("task_type", "creative"))
    }
}
