use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::{contains_any, dedent, is_vietnamese, task_type_in};
use crate::agents::{Agent, AgentOutput, Task};
use crate::providers::{CompletionRequest, GenerationOptions, LLMProvider};

const REASONING_KEYWORDS: &[&str] = &[
    "why", "how", "explain", "solve", "analyze", "reason", "think", "logic",
    "step by step", "compare", "contrast", "evaluate",
    "tại sao", "giải thích", "phân tích", "suy luận", "so sánh", "đánh giá",
];

const REASONING_TASK_TYPES: &[&str] = &["reasoning", "logic", "problem_solving"];

/// Chain-of-thought problem solving
pub struct ReasoningAgent {
    name: String,
    description: String,
    provider: Arc<dyn LLMProvider>,
    options: GenerationOptions,
}

impl ReasoningAgent {
    pub fn new(provider: Arc<dyn LLMProvider>, options: GenerationOptions) -> Self {
        Self {
            name: "Reasoning Agent".to_string(),
            description: "Specialized in logical reasoning, problem-solving, and structured thinking"
                .to_string(),
            provider,
            options,
        }
    }

    fn system_prompt(&self, task: &Task) -> String {
        let mut additional = String::new();

        let step_by_step = task
            .get_bool("step_by_step")
            .or_else(|| task.get_bool("require_step_by_step"))
            .unwrap_or(true);
        if step_by_step {
            additional.push_str("\nProvide your reasoning in clear, numbered steps.");
        }
        if task.get_bool("require_formal").unwrap_or(false) {
            additional.push_str(
                "\nUse formal notation where appropriate, showing logical relationships precisely.",
            );
        }
        if is_vietnamese(task.query()) {
            additional.push_str("\nRespond in Vietnamese since the query is in Vietnamese.");
        }

        let base = dedent(
            "You are an advanced reasoning assistant, specialized in logical analysis and problem-solving.
            You excel at breaking down complex problems into manageable steps and finding logical solutions.

            When given a question or problem:
            1. First, identify the key elements of the problem
            2. Break down the problem into smaller parts if needed
            3. Apply appropriate reasoning techniques (deductive, inductive, etc.)
            4. Provide clear explanations for each step in your reasoning
            5. Arrive at a well-justified conclusion"
        );
        let additional = additional.trim_start();
        if additional.is_empty() {
            base
        } else {
            format!("{}\n{}", base, additional)
        }
    }

    fn user_prompt(task: &Task) -> String {
        let context_section = match task.get_str("context") {
            Some(context) if !context.is_empty() => format!("\n\nAdditional context:\n{}", context),
            _ => String::new(),
        };
        format!(
            "Question or problem: {}{}\n\nPlease provide your reasoning and answer.",
            task.query(),
            context_section
        )
    }
}

#[async_trait]
impl Agent for ReasoningAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn evaluate_suitability(&self, task: &Task) -> Result<f64> {
        let query = task.query().to_lowercase();

        let score = if task_type_in(task.task_type(), REASONING_TASK_TYPES) {
            0.95
        } else if contains_any(&query, REASONING_KEYWORDS) {
            0.8
        } else if query.trim_end().ends_with('?') {
            0.6
        } else {
            0.4
        };
        Ok(score)
    }

    async fn process(&self, task: &Task) -> Result<AgentOutput> {
        let request = CompletionRequest::chat(
            self.options.model.clone(),
            self.system_prompt(task),
            Self::user_prompt(task),
        )
        .with_sampling(&self.options);

        let response = self.provider.complete(request).await?;

        Ok(AgentOutput::new()
            .with("answer", response.content.clone())
            .with("confidence", 0.9)
            .with("reasoning_chain", response.content)
            .with("task_type", "reasoning"))
    }
}
