use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub mod demo;

/// Represents a message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Request for a completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// System prompt followed by a single user turn
    pub fn chat(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![
                Message {
                    role: MessageRole::System,
                    content: system.into(),
                },
                Message {
                    role: MessageRole::User,
                    content: user.into(),
                },
            ],
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_sampling(mut self, sampling: &GenerationOptions) -> Self {
        self.temperature = Some(sampling.temperature);
        self.max_tokens = Some(sampling.max_tokens);
        self
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Response from a completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
}

/// Token usage information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Model and sampling settings shared by the agents of one coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "demo-assistant".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// Text-generation backend used by the specialized agents
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Get provider name
    fn name(&self) -> &str;

    /// Complete a prompt
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Estimate token count for a prompt
    fn estimate_tokens(&self, text: &str) -> u32 {
        // ~4 characters per token
        (text.len() / 4) as u32
    }
}

/// Provider registry for picking a backend by configured name
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LLMProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the in-process providers
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(demo::DemoProvider::new()));
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn LLMProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn LLMProvider>, ProviderError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(name.to_string()))
    }

    pub fn list_providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Error types for providers
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider not found: {0}")]
    NotFound(String),
}
