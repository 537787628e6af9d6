pub mod agents;
pub mod app;
pub mod config;
pub mod error;
pub mod providers;
pub mod retrieval;
pub mod tasks;
pub mod web;

pub use agents::{Agent, AgentOutput, Coordinator, CoordinatorBuilder, CoordinatorConfig, Task};
pub use error::CoordinatorError;
