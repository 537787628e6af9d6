use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Web search backend used by the research agent
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<WebResult>>;
}

/// Synthetic results for running without a search API key
#[derive(Debug, Default, Clone, Copy)]
pub struct MockWebSearch;

const MOCK_RESULT_LIMIT: usize = 3;

#[async_trait]
impl WebSearch for MockWebSearch {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<WebResult>> {
        warn!("No search API configured, returning mock results for: {}", query);

        Ok((1..=num_results.min(MOCK_RESULT_LIMIT))
            .map(|position| WebResult {
                title: format!("Mock Result {} for '{}'", position, query),
                url: format!("https://example.com/result/{}", position),
                snippet: format!(
                    "This is a mock search result for '{}'. A configured search backend returns real content here.",
                    query
                ),
            })
            .collect())
    }
}
