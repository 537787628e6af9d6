use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::{
    Agent, AgentInfo, AgentOutput, Task, AGENT_DESCRIPTION_KEY, AGENT_NAME_KEY, EXECUTION_TIME_KEY,
};
use crate::error::{CoordinatorError, Result};

/// Selection policy knobs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorConfig {
    /// Run every candidate at or above `confidence_threshold` concurrently.
    pub enable_parallel: bool,
    pub confidence_threshold: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            enable_parallel: false,
            confidence_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    index: usize,
    score: f64,
}

/// Picks agents for a task, runs them with a one-shot fallback to the
/// default agent, and reduces parallel results to one.
pub struct Coordinator {
    agents: Vec<Arc<dyn Agent>>,
    default_index: usize,
    config: CoordinatorConfig,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("agents", &self.agents.iter().map(|a| a.name()).collect::<Vec<_>>())
            .field("default_agent", &self.agents[self.default_index].name())
            .field("config", &self.config)
            .finish()
    }
}

impl Coordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// `default_agent` names one of `agents`; the first agent is used when it is `None`.
    pub fn new(
        agents: Vec<Arc<dyn Agent>>,
        default_agent: Option<&str>,
        config: CoordinatorConfig,
    ) -> Result<Self> {
        if agents.is_empty() {
            return Err(CoordinatorError::configuration(
                "At least one agent must be provided",
            ));
        }

        let threshold = config.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CoordinatorError::configuration(format!(
                "confidence_threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        let mut seen = HashSet::new();
        for agent in &agents {
            if !seen.insert(agent.name().to_lowercase()) {
                return Err(CoordinatorError::configuration(format!(
                    "Duplicate agent name: {}",
                    agent.name()
                )));
            }
        }

        let default_index = match default_agent {
            Some(name) => find_index(&agents, name).ok_or_else(|| {
                CoordinatorError::configuration(format!(
                    "Default agent '{}' is not registered",
                    name
                ))
            })?,
            None => 0,
        };

        info!("Initialized agent coordinator with {} agents", agents.len());
        for agent in &agents {
            info!("  - {}: {}", agent.name(), agent.description());
        }
        info!("Default agent: {}", agents[default_index].name());

        Ok(Self {
            agents,
            default_index,
            config,
        })
    }

    pub fn default_agent(&self) -> &Arc<dyn Agent> {
        &self.agents[self.default_index]
    }

    /// Case-insensitive lookup by name
    pub fn get_agent(&self, name: &str) -> Option<&Arc<dyn Agent>> {
        find_index(&self.agents, name).map(|index| &self.agents[index])
    }

    pub fn list_agents(&self) -> Vec<AgentInfo> {
        self.agents
            .iter()
            .enumerate()
            .map(|(index, agent)| AgentInfo {
                name: agent.name().to_string(),
                description: agent.description().to_string(),
                is_default: index == self.default_index,
                tools: agent
                    .as_tool_provider()
                    .map(|provider| provider.tools())
                    .unwrap_or_default(),
            })
            .collect()
    }

    pub async fn process_task(&self, task: &Task) -> Result<AgentOutput> {
        let started = Instant::now();

        if let Some(name) = task.preferred_agent() {
            match find_index(&self.agents, name) {
                Some(index) => {
                    info!("Using preferred agent: {}", self.agents[index].name());
                    let (producer, output) = self.execute_agent(index, task).await?;
                    return Ok(self.prepare_result(output, producer, started));
                }
                None => debug!("Preferred agent '{}' not registered, ranking instead", name),
            }
        }

        let ranked = self.evaluate_agents(task).await;

        debug!("Agent suitability scores for task: {}", task.query_preview(30));
        for candidate in &ranked {
            debug!("  - {}: {:.3}", self.agents[candidate.index].name(), candidate.score);
        }

        let Some(best) = ranked.first().copied() else {
            warn!("No suitable agents found, using default agent");
            let (producer, output) = self.execute_agent(self.default_index, task).await?;
            return Ok(self.prepare_result(output, producer, started));
        };

        if self.config.enable_parallel && ranked.len() > 1 {
            let parallel: Vec<usize> = ranked
                .iter()
                .filter(|c| c.score >= self.config.confidence_threshold)
                .map(|c| c.index)
                .collect();

            if parallel.len() > 1 {
                info!("Running {} agents in parallel", parallel.len());
                let results = self.execute_parallel(&parallel, task).await;
                let (producer, output) = combine_results(results)?;
                return Ok(self.prepare_result(output, producer, started));
            }
        }

        info!(
            "Selected agent: {} (score: {:.3})",
            self.agents[best.index].name(),
            best.score
        );
        let (producer, output) = self.execute_agent(best.index, task).await?;
        Ok(self.prepare_result(output, producer, started))
    }

    /// Scores every agent concurrently; failed evaluations count as zero.
    async fn evaluate_agents(&self, task: &Task) -> Vec<Candidate> {
        let evaluations = self.agents.iter().map(|agent| async move {
            match AssertUnwindSafe(agent.evaluate_suitability(task))
                .catch_unwind()
                .await
            {
                Ok(Ok(score)) => normalize_score(score),
                Ok(Err(e)) => {
                    warn!("Suitability evaluation failed for {}: {:#}", agent.name(), e);
                    0.0
                }
                Err(panic) => {
                    warn!(
                        "Suitability evaluation panicked for {}: {}",
                        agent.name(),
                        panic_message(panic.as_ref())
                    );
                    0.0
                }
            }
        });

        let scores = join_all(evaluations).await;
        rank_candidates(&scores)
    }

    /// Runs one agent, retrying once on the default agent if it fails.
    /// Returns the index of the agent whose output is used.
    async fn execute_agent(&self, index: usize, task: &Task) -> Result<(usize, AgentOutput)> {
        let agent = &self.agents[index];
        debug!("{} processing task: {}", agent.name(), task.query_preview(50));

        let failure = match run_process(agent.as_ref(), task).await {
            Ok(output) => return Ok((index, output)),
            Err(e) => e,
        };
        error!("Agent {} failed: {:#}", agent.name(), failure);

        if index == self.default_index {
            return Err(CoordinatorError::AgentFailed {
                agent: agent.name().to_string(),
                source: failure,
            });
        }

        let fallback = &self.agents[self.default_index];
        info!("Falling back to default agent: {}", fallback.name());
        debug!("{} processing task as fallback: {}", fallback.name(), task.query_preview(50));

        match run_process(fallback.as_ref(), task).await {
            Ok(output) => Ok((self.default_index, output)),
            Err(source) => {
                error!("Default agent {} failed: {:#}", fallback.name(), source);
                Err(CoordinatorError::AgentFailed {
                    agent: fallback.name().to_string(),
                    source,
                })
            }
        }
    }

    async fn execute_parallel(
        &self,
        indices: &[usize],
        task: &Task,
    ) -> Vec<Result<(usize, AgentOutput)>> {
        join_all(indices.iter().map(|&index| self.execute_agent(index, task))).await
    }

    fn prepare_result(&self, mut output: AgentOutput, producer: usize, started: Instant) -> AgentOutput {
        let agent = &self.agents[producer];

        for key in [AGENT_NAME_KEY, AGENT_DESCRIPTION_KEY, EXECUTION_TIME_KEY] {
            if output.contains(key) {
                warn!("Agent {} set reserved key '{}', overwriting", agent.name(), key);
            }
        }

        output.insert(AGENT_NAME_KEY, agent.name());
        output.insert(AGENT_DESCRIPTION_KEY, agent.description());
        output.insert(EXECUTION_TIME_KEY, started.elapsed().as_secs_f64());
        output
    }
}

/// Builder mirroring the construction-time parameter list
#[derive(Default)]
pub struct CoordinatorBuilder {
    agents: Vec<Arc<dyn Agent>>,
    default_agent: Option<String>,
    config: CoordinatorConfig,
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent<A: Agent + 'static>(self, agent: A) -> Self {
        self.agent_arc(Arc::new(agent))
    }

    pub fn agent_arc(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn default_agent(mut self, name: impl Into<String>) -> Self {
        self.default_agent = Some(name.into());
        self
    }

    pub fn enable_parallel(mut self, enabled: bool) -> Self {
        self.config.enable_parallel = enabled;
        self
    }

    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.config.confidence_threshold = threshold;
        self
    }

    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Coordinator> {
        Coordinator::new(self.agents, self.default_agent.as_deref(), self.config)
    }
}

fn find_index(agents: &[Arc<dyn Agent>], name: &str) -> Option<usize> {
    let wanted = name.to_lowercase();
    agents.iter().position(|a| a.name().to_lowercase() == wanted)
}

fn normalize_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Positive scores only, highest first. The sort is stable so ties keep
/// registration order.
fn rank_candidates(scores: &[f64]) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = scores
        .iter()
        .enumerate()
        .filter(|(_, score)| **score > 0.0)
        .map(|(index, score)| Candidate {
            index,
            score: *score,
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// Highest confidence wins, earliest on ties, missing confidence is 0.
/// Confidence is clamped into [0, 1] before comparing.
/// Failed branches are dropped; if every branch failed the first error is returned.
fn combine_results(results: Vec<Result<(usize, AgentOutput)>>) -> Result<(usize, AgentOutput)> {
    let mut best: Option<(usize, AgentOutput, f64)> = None;
    let mut first_error = None;

    for result in results {
        match result {
            Ok((producer, output)) => {
                let confidence = normalize_score(output.confidence().unwrap_or(0.0));
                let replace = match &best {
                    Some((_, _, best_confidence)) => confidence > *best_confidence,
                    None => true,
                };
                if replace {
                    best = Some((producer, output, confidence));
                }
            }
            Err(e) => {
                warn!("Parallel branch dropped: {}", e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match best {
        Some((producer, output, _)) => Ok((producer, output)),
        None => Err(first_error.unwrap_or_else(|| {
            CoordinatorError::configuration("parallel execution produced no results")
        })),
    }
}

async fn run_process(agent: &dyn Agent, task: &Task) -> anyhow::Result<AgentOutput> {
    match AssertUnwindSafe(agent.process(task)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(anyhow::anyhow!(
            "agent panicked: {}",
            panic_message(panic.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Barrier;

    #[derive(Clone, Copy)]
    enum Scoring {
        Fixed(f64),
        Error,
        Panic,
    }

    struct ScriptedAgent {
        name: String,
        scoring: Scoring,
        confidence: Option<f64>,
        fails: bool,
        barrier: Option<Arc<Barrier>>,
        work_barrier: Option<Arc<Barrier>>,
        delay: Duration,
        evaluations: AtomicUsize,
        processed: AtomicUsize,
    }

    impl ScriptedAgent {
        fn new(name: &str, score: f64) -> Self {
            Self {
                name: name.to_string(),
                scoring: Scoring::Fixed(score),
                confidence: None,
                fails: false,
                barrier: None,
                work_barrier: None,
                delay: Duration::ZERO,
                evaluations: AtomicUsize::new(0),
                processed: AtomicUsize::new(0),
            }
        }

        fn confidence(mut self, confidence: f64) -> Self {
            self.confidence = Some(confidence);
            self
        }

        fn failing(mut self) -> Self {
            self.fails = true;
            self
        }

        fn scoring(mut self, scoring: Scoring) -> Self {
            self.scoring = scoring;
            self
        }

        fn barrier(mut self, barrier: Arc<Barrier>) -> Self {
            self.barrier = Some(barrier);
            self
        }

        /// Both `process` calls must be in flight before either can finish.
        fn work_barrier(mut self, barrier: Arc<Barrier>) -> Self {
            self.work_barrier = Some(barrier);
            self
        }

        fn delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn shared(self) -> Arc<Self> {
            Arc::new(self)
        }

        fn processed(&self) -> usize {
            self.processed.load(Ordering::SeqCst)
        }

        fn evaluations(&self) -> usize {
            self.evaluations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "scripted test agent"
        }

        async fn evaluate_suitability(&self, _task: &Task) -> anyhow::Result<f64> {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            match self.scoring {
                Scoring::Fixed(score) => Ok(score),
                Scoring::Error => Err(anyhow!("scorer offline")),
                Scoring::Panic => panic!("scorer bug"),
            }
        }

        async fn process(&self, task: &Task) -> anyhow::Result<AgentOutput> {
            self.processed.fetch_add(1, Ordering::SeqCst);
            if let Some(barrier) = &self.work_barrier {
                barrier.wait().await;
            }
            tokio::time::sleep(self.delay).await;
            if self.fails {
                return Err(anyhow!("{} backend unavailable", self.name));
            }
            let mut output = AgentOutput::new().with("answer", format!("{}: {}", self.name, task.query()));
            if let Some(confidence) = self.confidence {
                output.insert("confidence", confidence);
            }
            Ok(output)
        }
    }

    fn coordinator(agents: &[Arc<ScriptedAgent>]) -> CoordinatorBuilder {
        agents
            .iter()
            .fold(Coordinator::builder(), |builder, agent| builder.agent_arc(agent.clone()))
    }

    #[test]
    fn test_empty_registry_is_configuration_error() {
        let err = Coordinator::builder().build().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let a = ScriptedAgent::new("Alpha", 0.5).shared();
        let b = ScriptedAgent::new("ALPHA", 0.5).shared();
        let err = coordinator(&[a, b]).build().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unknown_default_and_bad_threshold_rejected() {
        let a = ScriptedAgent::new("A", 0.5).shared();
        let err = coordinator(&[a.clone()]).default_agent("Z").build().unwrap_err();
        assert!(err.is_configuration());

        let err = coordinator(&[a]).confidence_threshold(1.5).build().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_first_agent_is_default() {
        let a = ScriptedAgent::new("A", 0.5).shared();
        let b = ScriptedAgent::new("B", 0.5).shared();
        let coordinator = coordinator(&[a, b]).build().unwrap();
        assert_eq!(coordinator.default_agent().name(), "A");
        assert!(coordinator.get_agent("b").is_some());
        assert!(coordinator.get_agent("nope").is_none());
    }

    #[tokio::test]
    async fn test_preferred_agent_runs_alone() {
        let a = ScriptedAgent::new("A", 0.9).shared();
        let b = ScriptedAgent::new("B", 0.1).shared();
        let coordinator = coordinator(&[a.clone(), b.clone()]).build().unwrap();

        let task = Task::new("hi").with("preferred_handler", "b");
        let output = coordinator.process_task(&task).await.unwrap();

        assert_eq!(output.agent_name(), Some("B"));
        assert_eq!(b.processed(), 1);
        assert_eq!(a.processed(), 0);
        assert_eq!(a.evaluations() + b.evaluations(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_preference_falls_through_to_ranking() {
        let a = ScriptedAgent::new("A", 0.2).shared();
        let b = ScriptedAgent::new("B", 0.8).shared();
        let coordinator = coordinator(&[a, b.clone()]).build().unwrap();

        let with_override = Task::new("hi").with("preferred_handler", "Ghost");
        let without = Task::new("hi");

        let first = coordinator.process_task(&with_override).await.unwrap();
        let second = coordinator.process_task(&without).await.unwrap();

        assert_eq!(first.agent_name(), Some("B"));
        assert_eq!(first.answer(), second.answer());
        assert_eq!(b.evaluations(), 2);
    }

    #[tokio::test]
    async fn test_no_positive_scores_uses_default() {
        let a = ScriptedAgent::new("A", 0.0).shared();
        let b = ScriptedAgent::new("B", -0.3).shared();
        let coordinator = coordinator(&[a, b.clone()]).default_agent("B").build().unwrap();

        let output = coordinator.process_task(&Task::new("hi")).await.unwrap();
        assert_eq!(output.agent_name(), Some("B"));
        assert_eq!(b.processed(), 1);
    }

    #[tokio::test]
    async fn test_ties_broken_by_registration_order() {
        let a = ScriptedAgent::new("A", 0.9).shared();
        let b = ScriptedAgent::new("B", 0.9).shared();
        let c = ScriptedAgent::new("C", 0.5).shared();
        let coordinator = coordinator(&[a, b, c]).build().unwrap();

        let output = coordinator.process_task(&Task::new("hi")).await.unwrap();
        assert_eq!(output.agent_name(), Some("A"));
    }

    #[tokio::test]
    async fn test_parallel_picks_highest_confidence() {
        let a = ScriptedAgent::new("A", 0.9).confidence(0.6).shared();
        let b = ScriptedAgent::new("B", 0.7).confidence(0.8).shared();
        let c = ScriptedAgent::new("C", 0.3).confidence(1.0).shared();
        let coordinator = coordinator(&[a.clone(), b.clone(), c.clone()])
            .enable_parallel(true)
            .confidence_threshold(0.5)
            .build()
            .unwrap();

        let output = coordinator.process_task(&Task::new("hi")).await.unwrap();

        assert_eq!(output.agent_name(), Some("B"));
        assert_eq!(output.answer(), Some("B: hi"));
        assert_eq!((a.processed(), b.processed(), c.processed()), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_parallel_confidence_tie_keeps_fan_out_order() {
        let a = ScriptedAgent::new("A", 0.6).confidence(0.7).shared();
        let b = ScriptedAgent::new("B", 0.9).confidence(0.7).shared();
        let coordinator = coordinator(&[a, b]).enable_parallel(true).build().unwrap();

        // B ranks first, so it leads the fan-out.
        let output = coordinator.process_task(&Task::new("hi")).await.unwrap();
        assert_eq!(output.agent_name(), Some("B"));
    }

    #[tokio::test]
    async fn test_fan_out_is_concurrent_and_ordered_by_rank() {
        let barrier = Arc::new(Barrier::new(2));
        let a = ScriptedAgent::new("A", 0.9)
            .confidence(0.7)
            .work_barrier(barrier.clone())
            .delay(Duration::from_millis(100))
            .shared();
        let b = ScriptedAgent::new("B", 0.8)
            .confidence(0.7)
            .work_barrier(barrier)
            .shared();
        let coordinator = coordinator(&[a.clone(), b.clone()])
            .enable_parallel(true)
            .build()
            .unwrap();

        // B finishes first, but A leads the fan-out and wins the tie.
        let output = tokio::time::timeout(Duration::from_secs(2), coordinator.process_task(&Task::new("hi")))
            .await
            .expect("branches did not overlap")
            .unwrap();
        assert_eq!(output.agent_name(), Some("A"));
        assert_eq!((a.processed(), b.processed()), (1, 1));
    }

    #[tokio::test]
    async fn test_parallel_clamps_out_of_range_confidence() {
        let a = ScriptedAgent::new("A", 0.9).confidence(1.0).shared();
        let b = ScriptedAgent::new("B", 0.8).confidence(7.0).shared();
        let coordinator = coordinator(&[a, b]).enable_parallel(true).build().unwrap();

        let output = coordinator.process_task(&Task::new("hi")).await.unwrap();
        assert_eq!(output.agent_name(), Some("A"));
    }

    #[tokio::test]
    async fn test_parallel_without_confidence_uses_first_result() {
        let a = ScriptedAgent::new("A", 0.7).shared();
        let b = ScriptedAgent::new("B", 0.8).shared();
        let coordinator = coordinator(&[a, b]).enable_parallel(true).build().unwrap();

        let output = coordinator.process_task(&Task::new("hi")).await.unwrap();
        assert_eq!(output.agent_name(), Some("B"));
    }

    #[tokio::test]
    async fn test_single_qualifier_skips_fan_out() {
        let a = ScriptedAgent::new("A", 0.9).shared();
        let b = ScriptedAgent::new("B", 0.2).shared();
        let coordinator = coordinator(&[a.clone(), b.clone()])
            .enable_parallel(true)
            .build()
            .unwrap();

        let output = coordinator.process_task(&Task::new("hi")).await.unwrap();
        assert_eq!(output.agent_name(), Some("A"));
        assert_eq!(b.processed(), 0);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_default() {
        let a = ScriptedAgent::new("A", 0.1).shared();
        let b = ScriptedAgent::new("B", 0.9).failing().shared();
        let coordinator = coordinator(&[a.clone(), b.clone()]).build().unwrap();

        let output = coordinator.process_task(&Task::new("hi")).await.unwrap();

        assert_eq!(output.agent_name(), Some("A"));
        assert_eq!(b.processed(), 1);
        assert_eq!(a.processed(), 1);
    }

    #[tokio::test]
    async fn test_default_failure_is_fatal() {
        let a = ScriptedAgent::new("A", 0.1).failing().shared();
        let b = ScriptedAgent::new("B", 0.9).failing().shared();
        let coordinator = coordinator(&[a.clone(), b.clone()]).build().unwrap();

        let err = coordinator.process_task(&Task::new("hi")).await.unwrap_err();
        match err {
            CoordinatorError::AgentFailed { agent, .. } => assert_eq!(agent, "A"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(a.processed(), 1);
        assert_eq!(b.processed(), 1);
    }

    #[tokio::test]
    async fn test_default_failure_is_not_retried() {
        let a = ScriptedAgent::new("A", 0.9).failing().shared();
        let coordinator = coordinator(&[a.clone()]).build().unwrap();

        assert!(coordinator.process_task(&Task::new("hi")).await.is_err());
        assert_eq!(a.processed(), 1);
    }

    #[tokio::test]
    async fn test_parallel_branch_failure_does_not_abort_siblings() {
        let d = ScriptedAgent::new("D", 0.8).failing().shared();
        let b = ScriptedAgent::new("B", 0.9).confidence(0.4).shared();
        let coordinator = coordinator(&[d.clone(), b.clone()])
            .enable_parallel(true)
            .build()
            .unwrap();

        let output = coordinator.process_task(&Task::new("hi")).await.unwrap();
        assert_eq!(output.agent_name(), Some("B"));
        assert_eq!(d.processed(), 1);
    }

    #[tokio::test]
    async fn test_parallel_fallback_result_carries_default_metadata() {
        let d = ScriptedAgent::new("D", 0.2).confidence(0.9).shared();
        let a = ScriptedAgent::new("A", 0.9).failing().shared();
        let b = ScriptedAgent::new("B", 0.8).confidence(0.5).shared();
        let coordinator = coordinator(&[d.clone(), a, b])
            .enable_parallel(true)
            .build()
            .unwrap();

        let output = coordinator.process_task(&Task::new("hi")).await.unwrap();
        assert_eq!(output.agent_name(), Some("D"));
        assert_eq!(d.processed(), 1);
    }

    #[tokio::test]
    async fn test_evaluator_failures_score_zero() {
        let a = ScriptedAgent::new("A", 0.0).scoring(Scoring::Error).shared();
        let b = ScriptedAgent::new("B", 0.0).scoring(Scoring::Panic).shared();
        let c = ScriptedAgent::new("C", 0.4).shared();
        let coordinator = coordinator(&[a, b, c.clone()]).build().unwrap();

        let output = coordinator.process_task(&Task::new("hi")).await.unwrap();
        assert_eq!(output.agent_name(), Some("C"));
        assert_eq!(c.processed(), 1);
    }

    #[tokio::test]
    async fn test_evaluations_run_concurrently() {
        let barrier = Arc::new(Barrier::new(3));
        let agents: Vec<_> = ["A", "B", "C"]
            .iter()
            .map(|name| ScriptedAgent::new(name, 0.5).barrier(barrier.clone()).shared())
            .collect();
        let coordinator = coordinator(&agents).build().unwrap();

        // Sequential evaluation would never get past the barrier.
        let output = tokio::time::timeout(Duration::from_secs(2), coordinator.process_task(&Task::new("hi")))
            .await
            .expect("evaluations did not overlap")
            .unwrap();
        assert_eq!(output.agent_name(), Some("A"));
    }

    #[tokio::test]
    async fn test_enrichment_is_stable_across_calls() {
        let a = ScriptedAgent::new("A", 0.5).confidence(0.5).shared();
        let coordinator = coordinator(&[a]).build().unwrap();
        let task = Task::new("same input");

        let first = coordinator.process_task(&task).await.unwrap();
        let second = coordinator.process_task(&task).await.unwrap();

        assert_eq!(first.agent_name(), second.agent_name());
        assert_eq!(first.answer(), second.answer());
        assert_eq!(
            first.get(AGENT_DESCRIPTION_KEY),
            Some(&serde_json::Value::from("scripted test agent"))
        );
        assert!(first.execution_time().unwrap() >= 0.0);
    }

    #[test]
    fn test_rank_candidates_stable_and_positive_only() {
        let ranked = rank_candidates(&[0.3, 0.9, 0.0, 0.9, -1.0]);
        let order: Vec<usize> = ranked.iter().map(|c| c.index).collect();
        assert_eq!(order, vec![1, 3, 0]);
    }

    #[test]
    fn test_normalize_score() {
        assert_eq!(normalize_score(f64::NAN), 0.0);
        assert_eq!(normalize_score(1.7), 1.0);
        assert_eq!(normalize_score(0.4), 0.4);
        assert_eq!(normalize_score(-0.2), 0.0);
    }

    #[test]
    fn test_combine_all_failed_returns_first_error() {
        let results = vec![
            Err(CoordinatorError::AgentFailed {
                agent: "A".to_string(),
                source: anyhow!("first"),
            }),
            Err(CoordinatorError::AgentFailed {
                agent: "B".to_string(),
                source: anyhow!("second"),
            }),
        ];
        match combine_results(results) {
            Err(CoordinatorError::AgentFailed { agent, .. }) => assert_eq!(agent, "A"),
            _ => panic!("expected first branch error"),
        }
    }
}
