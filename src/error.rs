/// Errors surfaced by the coordinator to its callers
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// Invalid construction-time setup. Never recovered internally.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An agent failed and no further fallback was available.
    #[error("Agent '{agent}' failed: {source}")]
    AgentFailed {
        agent: String,
        #[source]
        source: anyhow::Error,
    },
}

impl CoordinatorError {
    pub fn configuration(message: impl Into<String>) -> Self {
        CoordinatorError::Configuration(message.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, CoordinatorError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
