use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::{contains_any, dedent, task_type_in};
use crate::agents::{Agent, AgentOutput, FunctionCall, FunctionRegistry, FunctionSpec, Task, ToolProvider};
use crate::error::CoordinatorError;
use crate::providers::{CompletionRequest, GenerationOptions, LLMProvider};
use crate::retrieval::{Retriever, SearchFilters};
use crate::web::WebSearch;

const RESEARCH_KEYWORDS: &[&str] = &[
    "find", "search", "lookup", "research", "information", "data",
    "tìm", "kiếm", "tra cứu", "nghiên cứu", "thông tin", "dữ liệu",
];

const RESEARCH_TASK_TYPES: &[&str] = &["research", "rag", "web_search"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResearchLimits {
    /// Documents requested from the retriever
    pub top_k: usize,
    /// Documents echoed back as `sources`
    pub max_sources: usize,
    pub web_results: usize,
}

impl Default for ResearchLimits {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_sources: 3,
            web_results: 3,
        }
    }
}

/// Retrieval-augmented answers from the document store and, on request, the web
pub struct ResearchAgent {
    name: String,
    description: String,
    provider: Arc<dyn LLMProvider>,
    options: GenerationOptions,
    retriever: Arc<dyn Retriever>,
    web: Arc<dyn WebSearch>,
    limits: ResearchLimits,
    functions: FunctionRegistry,
}

impl ResearchAgent {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        options: GenerationOptions,
        retriever: Arc<dyn Retriever>,
        web: Arc<dyn WebSearch>,
        limits: ResearchLimits,
    ) -> Result<Self, CoordinatorError> {
        let functions = Self::build_functions(retriever.clone(), web.clone(), limits)?;

        Ok(Self {
            name: "Research Agent".to_string(),
            description: "Specialized in retrieving and synthesizing information from various sources"
                .to_string(),
            provider,
            options,
            retriever,
            web,
            limits,
            functions,
        })
    }

    fn build_functions(
        retriever: Arc<dyn Retriever>,
        web: Arc<dyn WebSearch>,
        limits: ResearchLimits,
    ) -> Result<FunctionRegistry, CoordinatorError> {
        let mut functions = FunctionRegistry::new();

        functions.register(
            FunctionSpec::new("vector_search", "Search the vector database for relevant information")
                .with_parameters(json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "filters": {"type": "object"},
                        "top_k": {"type": "integer"}
                    },
                    "required": ["query"]
                })),
            move |args| {
                let retriever = retriever.clone();
                async move {
                    let query = required_str(&args, "query")?;
                    let filters = args
                        .get("filters")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default();
                    let top_k = args
                        .get("top_k")
                        .and_then(Value::as_u64)
                        .map(|k| k as usize)
                        .unwrap_or(limits.top_k);
                    let docs = retriever.search(&query, &filters, top_k).await?;
                    Ok::<Value, anyhow::Error>(serde_json::to_value(docs)?)
                }
            },
        )?;

        functions.register(
            FunctionSpec::new("web_search", "Search the web for additional information")
                .with_parameters(json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "num_results": {"type": "integer"}
                    },
                    "required": ["query"]
                })),
            move |args| {
                let web = web.clone();
                async move {
                    let query = required_str(&args, "query")?;
                    let num_results = args
                        .get("num_results")
                        .and_then(Value::as_u64)
                        .map(|n| n as usize)
                        .unwrap_or(limits.web_results);
                    let results = web.search(&query, num_results).await?;
                    Ok::<Value, anyhow::Error>(serde_json::to_value(results)?)
                }
            },
        )?;

        Ok(functions)
    }

    fn system_prompt() -> String {
        dedent(
            "You are a research assistant specialized in analyzing and synthesizing information from multiple sources.
            You will receive a query and context information. Your goal is to provide a comprehensive and accurate answer.

            Use the following steps:
            1. Analyze the query to understand what information is being requested
            2. Review the provided context carefully
            3. Synthesize the relevant information from all sources
            4. Present a clear and concise answer
            5. Indicate the confidence level in your answer based on the available information

            If the context doesn't contain sufficient information to answer the query, acknowledge this limitation.",
        )
    }
}

fn required_str(args: &Map<String, Value>, key: &str) -> Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("missing required argument '{}'", key))
}

#[async_trait]
impl Agent for ResearchAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn evaluate_suitability(&self, task: &Task) -> Result<f64> {
        let query = task.query().to_lowercase();

        let score = if task_type_in(task.task_type(), RESEARCH_TASK_TYPES) {
            0.95
        } else if contains_any(&query, RESEARCH_KEYWORDS) {
            0.8
        } else {
            0.3
        };
        Ok(score)
    }

    async fn process(&self, task: &Task) -> Result<AgentOutput> {
        let query = task.query();
        let filters: SearchFilters = task
            .get("filters")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let docs = self.retriever.search(query, &filters, self.limits.top_k).await?;

        let web_results = if task.get_bool("use_web_search").unwrap_or(false) {
            self.web.search(query, self.limits.web_results).await?
        } else {
            Vec::new()
        };
        debug!(
            "Research context: {} documents, {} web results",
            docs.len(),
            web_results.len()
        );

        let context = docs
            .iter()
            .map(|doc| doc.content.clone())
            .chain(
                web_results
                    .iter()
                    .map(|r| format!("{}: {} ({})", r.title, r.snippet, r.url)),
            )
            .collect::<Vec<_>>()
            .join("\n\n");

        let user_prompt = format!(
            "Query: {}\n\nContext:\n{}\n\nRespond in Vietnamese if the query is in Vietnamese.",
            query, context
        );

        let request = CompletionRequest::chat(self.options.model.clone(), Self::system_prompt(), user_prompt)
            .with_sampling(&self.options);
        let response = self.provider.complete(request).await?;

        let source_count = docs.len() + web_results.len();
        let sources: Vec<_> = docs.into_iter().take(self.limits.max_sources).collect();

        let mut output = AgentOutput::new()
            .with("answer", response.content)
            .with("sources", serde_json::to_value(sources)?)
            .with("confidence", 0.85)
            .with(
                "reasoning",
                format!(
                    "Synthesized information from {} sources to provide a comprehensive answer.",
                    source_count
                ),
            );
        if !web_results.is_empty() {
            output.insert("web_results", serde_json::to_value(web_results)?);
        }
        Ok(output)
    }

    fn as_tool_provider(&self) -> Option<&dyn ToolProvider> {
        Some(self)
    }
}

#[async_trait]
impl ToolProvider for ResearchAgent {
    fn tools(&self) -> Vec<FunctionSpec> {
        self.functions.specs()
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> FunctionCall {
        self.functions.call(name, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::demo::DemoProvider;
    use crate::retrieval::{Document, StaticRetriever, TermOverlapScorer};
    use crate::web::MockWebSearch;
    use std::time::Duration;

    fn agent() -> ResearchAgent {
        let retriever = StaticRetriever::new(
            vec![
                Document::new("Rayleigh scattering explains why the sky is blue").with_metadata("topic", "physics"),
                Document::new("Blue whales are the largest animals").with_metadata("topic", "biology"),
                Document::new("The sky appears red at sunset").with_metadata("topic", "physics"),
                Document::new("Sky diving requires training").with_metadata("topic", "sport"),
            ],
            Arc::new(TermOverlapScorer),
        );
        ResearchAgent::new(
            Arc::new(DemoProvider::new().with_latency(Duration::ZERO)),
            GenerationOptions::default(),
            Arc::new(retriever),
            Arc::new(MockWebSearch),
            ResearchLimits {
                top_k: 5,
                max_sources: 2,
                web_results: 2,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_suitability_tiers() {
        let agent = agent();
        let explicit = Task::new("anything").with("task_type", "rag");
        assert_eq!(agent.evaluate_suitability(&explicit).await.unwrap(), 0.95);
        assert_eq!(
            agent.evaluate_suitability(&Task::new("Tìm kiếm thông tin về lịch sử")).await.unwrap(),
            0.8
        );
        assert_eq!(agent.evaluate_suitability(&Task::new("Hello there")).await.unwrap(), 0.3);
    }

    #[tokio::test]
    async fn test_process_limits_sources() {
        let task = Task::new("why is the sky blue");
        let output = agent().process(&task).await.unwrap();

        let sources = output.get("sources").and_then(Value::as_array).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(output.confidence(), Some(0.85));
        assert!(!output.contains("web_results"));
    }

    #[tokio::test]
    async fn test_process_honours_filters_and_web_toggle() {
        let task = Task::new("sky")
            .with("filters", json!({"topic": "sport"}))
            .with("use_web_search", true);
        let output = agent().process(&task).await.unwrap();

        let sources = output.get("sources").and_then(Value::as_array).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0]["metadata"]["topic"], json!("sport"));
        assert_eq!(output.get("web_results").and_then(Value::as_array).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tools_dispatch() {
        let agent = agent();
        let provider = agent.as_tool_provider().unwrap();
        let names: Vec<_> = provider.tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["vector_search", "web_search"]);

        let mut args = Map::new();
        args.insert("query".to_string(), json!("blue"));
        args.insert("top_k".to_string(), json!(1));
        let call = provider.call_tool("vector_search", args).await;
        assert_eq!(call.result.unwrap().as_array().unwrap().len(), 1);

        let missing = provider.call_tool("web_search", Map::new()).await;
        assert_eq!(missing.error.as_deref(), Some("missing required argument 'query'"));

        let unknown = provider.call_tool("translate", Map::new()).await;
        assert!(!unknown.is_ok());
    }
}
