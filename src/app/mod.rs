use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::agents::specialized::{CreativeAgent, ReasoningAgent, ResearchAgent};
use crate::agents::{AgentInfo, AgentOutput, Coordinator, Task};
use crate::config::Settings;
use crate::providers::{LLMProvider, ProviderRegistry};
use crate::retrieval::{Retriever, StaticRetriever};
use crate::tasks::{InMemoryTaskStore, JobRunner};
use crate::web::{MockWebSearch, WebSearch};

/// External services the specialized agents call into
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn LLMProvider>,
    pub retriever: Arc<dyn Retriever>,
    pub web: Arc<dyn WebSearch>,
}

impl Collaborators {
    /// In-process stand-ins: the configured built-in provider, an empty
    /// corpus and mock web search.
    pub fn builtin(settings: &Settings) -> Result<Self> {
        let provider = ProviderRegistry::with_builtin().get(&settings.provider.name)?;
        Ok(Self {
            provider,
            retriever: Arc::new(StaticRetriever::empty()),
            web: Arc::new(MockWebSearch),
        })
    }
}

/// Registers research, reasoning and creative agents, in that order.
pub fn build_coordinator(settings: &Settings, collaborators: &Collaborators) -> Result<Coordinator> {
    let options = settings.generation_options();

    let research = ResearchAgent::new(
        collaborators.provider.clone(),
        options.clone(),
        collaborators.retriever.clone(),
        collaborators.web.clone(),
        settings.research_limits(),
    )?;
    let reasoning = ReasoningAgent::new(collaborators.provider.clone(), options.clone());
    let creative = CreativeAgent::new(collaborators.provider.clone(), options);

    let mut builder = Coordinator::builder()
        .agent(research)
        .agent(reasoning)
        .agent(creative)
        .config(settings.coordinator_config());
    if let Some(default_agent) = &settings.coordinator.default_agent {
        builder = builder.default_agent(default_agent.clone());
    }

    Ok(builder.build()?)
}

/// Service-layer wiring: one shared coordinator plus the background job table
pub struct Application {
    coordinator: Arc<Coordinator>,
    store: Arc<InMemoryTaskStore>,
    jobs: JobRunner,
    evict_every: std::time::Duration,
    evictor: Option<JoinHandle<()>>,
}

impl Application {
    pub fn new(settings: &Settings) -> Result<Self> {
        let collaborators = Collaborators::builtin(settings)?;
        Self::with_collaborators(settings, &collaborators)
    }

    pub fn with_collaborators(settings: &Settings, collaborators: &Collaborators) -> Result<Self> {
        let coordinator = Arc::new(build_coordinator(settings, collaborators)?);
        let store = Arc::new(InMemoryTaskStore::new(settings.task_ttl()));
        let jobs = JobRunner::new(coordinator.clone(), store.clone());

        info!("Provider: {}", collaborators.provider.name());
        Ok(Self {
            coordinator,
            store,
            jobs,
            evict_every: settings.evict_interval(),
            evictor: None,
        })
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn jobs(&self) -> &JobRunner {
        &self.jobs
    }

    pub fn agents(&self) -> Vec<AgentInfo> {
        self.coordinator.list_agents()
    }

    pub async fn query(&self, task: &Task) -> Result<AgentOutput> {
        Ok(self.coordinator.process_task(task).await?)
    }

    /// Starts evicting expired jobs on the configured interval. The task
    /// lives until the application is dropped. Must be called inside a
    /// tokio runtime.
    pub fn start_eviction(&mut self) {
        if let Some(previous) = self.evictor.take() {
            previous.abort();
        }
        self.evictor = Some(self.store.clone().spawn_evictor(self.evict_every));
    }

    pub async fn pending_jobs(&self) -> usize {
        self.store.len().await
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        if let Some(evictor) = self.evictor.take() {
            evictor.abort();
        }
    }
}
