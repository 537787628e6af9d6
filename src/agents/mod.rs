pub mod coordinator;
pub mod functions;
pub mod specialized;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use coordinator::{Coordinator, CoordinatorBuilder, CoordinatorConfig};
pub use functions::{FunctionCall, FunctionRegistry, FunctionSpec};

/// Keys the coordinator writes onto every output. Agents must not set them.
pub const AGENT_NAME_KEY: &str = "agent_name";
pub const AGENT_DESCRIPTION_KEY: &str = "agent_description";
pub const EXECUTION_TIME_KEY: &str = "execution_time";

const PREFERRED_HANDLER_KEY: &str = "preferred_handler";
const PREFERRED_AGENT_KEY: &str = "preferred_agent";

/// A unit of work described by named fields.
///
/// Only `query` and `preferred_handler` mean anything to the coordinator;
/// every other field is passed through to the agents untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Task {
    fields: Map<String, Value>,
}

impl Task {
    pub fn new(query: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("query".to_string(), Value::String(query.into()));
        Self { fields }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn query(&self) -> &str {
        self.get_str("query").unwrap_or("")
    }

    /// Explicit override, read from `preferred_handler` or the older
    /// `preferred_agent` key. Blank names count as no override.
    pub fn preferred_agent(&self) -> Option<&str> {
        self.get_str(PREFERRED_HANDLER_KEY)
            .or_else(|| self.get_str(PREFERRED_AGENT_KEY))
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn task_type(&self) -> Option<&str> {
        self.get_str("task_type")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// First `max_chars` characters of the query, for log lines.
    pub fn query_preview(&self, max_chars: usize) -> String {
        let query = self.query();
        match query.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &query[..idx]),
            None => query.to_string(),
        }
    }
}

/// Result mapping produced by an agent and enriched by the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentOutput {
    fields: Map<String, Value>,
}

impl AgentOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// The agent's answer, under either `answer` or `content`.
    pub fn answer(&self) -> Option<&str> {
        self.fields
            .get("answer")
            .or_else(|| self.fields.get("content"))
            .and_then(Value::as_str)
    }

    /// Self-reported confidence. Missing, non-numeric and NaN values are `None`.
    pub fn confidence(&self) -> Option<f64> {
        self.fields
            .get("confidence")
            .and_then(Value::as_f64)
            .filter(|c| !c.is_nan())
    }

    pub fn agent_name(&self) -> Option<&str> {
        self.fields.get(AGENT_NAME_KEY).and_then(Value::as_str)
    }

    pub fn execution_time(&self) -> Option<f64> {
        self.fields.get(EXECUTION_TIME_KEY).and_then(Value::as_f64)
    }
}

/// Contract every agent implements. Agents take `&self` so one instance can
/// serve concurrent tasks.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// How well this agent fits `task`, from 0.0 to 1.0. Zero or below declines.
    async fn evaluate_suitability(&self, task: &Task) -> Result<f64>;

    async fn process(&self, task: &Task) -> Result<AgentOutput>;

    /// Agents that expose callable tools return themselves here.
    fn as_tool_provider(&self) -> Option<&dyn ToolProvider> {
        None
    }
}

/// Optional capability: a fixed table of functions an agent can invoke.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn tools(&self) -> Vec<FunctionSpec>;
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> FunctionCall;
}

/// Registration summary for listing endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
    pub is_default: bool,
    pub tools: Vec<FunctionSpec>,
}
