use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::error::CoordinatorError;

type FunctionHandler =
    Arc<dyn Fn(Map<String, Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Declared shape of a callable function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Value::Null,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Outcome of a function call. Failures are captured here, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub result: Option<Value>,
    pub error: Option<String>,
    pub execution_time: f64,
}

impl FunctionCall {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn missing(name: &str) -> Self {
        Self {
            result: None,
            error: Some(format!("Function '{}' not found", name)),
            execution_time: 0.0,
        }
    }
}

/// Name → handler table fixed when the owning agent is built.
#[derive(Default)]
pub struct FunctionRegistry {
    specs: Vec<FunctionSpec>,
    handlers: HashMap<String, FunctionHandler>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, spec: FunctionSpec, handler: F) -> Result<(), CoordinatorError>
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        if self.handlers.contains_key(&spec.name) {
            return Err(CoordinatorError::configuration(format!(
                "function '{}' is already registered",
                spec.name
            )));
        }

        let handler: FunctionHandler = Arc::new(move |args| handler(args).boxed());
        self.handlers.insert(spec.name.clone(), handler);
        self.specs.push(spec);
        Ok(())
    }

    pub fn specs(&self) -> Vec<FunctionSpec> {
        self.specs.clone()
    }

    pub async fn call(&self, name: &str, arguments: Map<String, Value>) -> FunctionCall {
        let Some(handler) = self.handlers.get(name) else {
            return FunctionCall::missing(name);
        };

        let shown = serde_json::Value::Object(arguments.clone());
        info!("Calling function {} with arguments: {}", name, shown);
        let start = Instant::now();

        match handler(arguments).await {
            Ok(result) => FunctionCall {
                result: Some(result),
                error: None,
                execution_time: start.elapsed().as_secs_f64(),
            },
            Err(e) => {
                error!("Error calling function {}: {}", name, e);
                FunctionCall {
                    result: None,
                    error: Some(e.to_string()),
                    execution_time: start.elapsed().as_secs_f64(),
                }
            }
        }
    }
}
