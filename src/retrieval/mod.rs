//! Retrieval contract consumed by the research agent.
//!
//! Scoring is delegated to a [`Scorer`]; retrievers here only filter and
//! rank by whatever score it returns.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

pub type SearchFilters = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    fn matches(&self, filters: &SearchFilters) -> bool {
        filters
            .iter()
            .all(|(key, expected)| self.metadata.get(key) == Some(expected))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub content: String,
    pub metadata: Map<String, Value>,
    pub score: f64,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>>;
}

/// Relevance of one document to a query. Zero or below drops the document.
pub trait Scorer: Send + Sync {
    fn score(&self, query: &str, document: &Document) -> f64;
}

/// Share of distinct query terms that appear in the document.
pub struct TermOverlapScorer;

impl Scorer for TermOverlapScorer {
    fn score(&self, query: &str, document: &Document) -> f64 {
        let terms: HashSet<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if terms.is_empty() {
            return 0.0;
        }

        let content = document.content.to_lowercase();
        let hits = terms.iter().filter(|t| content.contains(t.as_str())).count();
        hits as f64 / terms.len() as f64
    }
}

/// Fixed in-memory corpus ranked by an external scorer
pub struct StaticRetriever {
    documents: Vec<Document>,
    scorer: Arc<dyn Scorer>,
}

impl StaticRetriever {
    pub fn new(documents: Vec<Document>, scorer: Arc<dyn Scorer>) -> Self {
        Self { documents, scorer }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Arc::new(TermOverlapScorer))
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let mut ranked: Vec<ScoredDocument> = self
            .documents
            .iter()
            .filter(|doc| doc.matches(filters))
            .filter_map(|doc| {
                let score = self.scorer.score(query, doc);
                (score > 0.0).then(|| ScoredDocument {
                    content: doc.content.clone(),
                    metadata: doc.metadata.clone(),
                    score,
                })
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(top_k);
        Ok(ranked)
    }
}
