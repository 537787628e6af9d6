use super::*;
use std::time::Duration;
use tokio::time::sleep;

/// Keyword-matched canned replies, for running without any model backend
pub struct DemoProvider {
    responses: Vec<(&'static str, &'static str)>,
    latency: Duration,
}

impl DemoProvider {
    pub fn new() -> Self {
        Self {
            responses: vec![
                ("hello", "Hello! I'm running in demo mode without a language model backend."),
                ("sky", "The sky looks blue because air molecules scatter short blue wavelengths of sunlight more strongly than red ones (Rayleigh scattering)."),
                ("poem", "Quiet circuits hum,\nagents weigh the question asked,\none answer returns."),
                ("rust", "Rust is a systems programming language focused on safety, speed, and concurrency."),
            ],
            latency: Duration::from_millis(50),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn find_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        for (keyword, response) in &self.responses {
            if input_lower.contains(keyword) {
                return response.to_string();
            }
        }

        format!(
            "Demo mode has no model attached. Received {} characters of prompt; \
            configure a real provider for generated answers.",
            input.chars().count()
        )
    }
}

impl Default for DemoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMProvider for DemoProvider {
    fn name(&self) -> &str {
        "demo"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let user_message = request.last_user_message().unwrap_or("");
        let response = self.find_response(user_message);

        sleep(self.latency).await;

        let prompt_tokens = self.estimate_tokens(user_message);
        let completion_tokens = self.estimate_tokens(&response);

        Ok(CompletionResponse {
            content: response,
            model: request.model,
            usage: Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }
}
