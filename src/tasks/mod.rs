pub mod runner;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::agents::AgentOutput;

pub use runner::JobRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// One background execution of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: f64,
    pub result: Option<AgentOutput>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn queued() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Queued,
            progress: 0.0,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, update: JobUpdate) {
        self.status = update.status;
        if let Some(progress) = update.progress {
            self.progress = progress.clamp(0.0, 1.0);
        }
        if update.result.is_some() {
            self.result = update.result;
        }
        if update.error.is_some() {
            self.error = update.error;
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub progress: Option<f64>,
    pub result: Option<AgentOutput>,
    pub error: Option<String>,
}

impl JobUpdate {
    fn status(status: JobStatus) -> Self {
        Self {
            status,
            progress: None,
            result: None,
            error: None,
        }
    }

    pub fn processing() -> Self {
        Self::status(JobStatus::Processing)
    }

    pub fn completed(result: AgentOutput) -> Self {
        Self {
            progress: Some(1.0),
            result: Some(result),
            ..Self::status(JobStatus::Completed)
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::status(JobStatus::Failed)
        }
    }

    pub fn cancelled() -> Self {
        Self::status(JobStatus::Cancelled)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskStoreError {
    #[error("Task not found: {0}")]
    NotFound(Uuid),
    #[error("Task already finished: {0}")]
    AlreadyFinished(Uuid),
}

/// Job bookkeeping owned by the service layer, not by the coordinator
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn put(&self, record: JobRecord);
    async fn get(&self, id: Uuid) -> Option<JobRecord>;
    /// Fails with `AlreadyFinished` once the record is in a terminal state.
    async fn update_status(&self, id: Uuid, update: JobUpdate) -> Result<(), TaskStoreError>;
    /// Drops expired records and returns how many were removed.
    async fn evict_expired(&self) -> usize;
}

/// Process-local store; records expire `ttl` after their last update.
pub struct InMemoryTaskStore {
    records: RwLock<HashMap<Uuid, JobRecord>>,
    ttl: Duration,
}

impl InMemoryTaskStore {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(36_500)),
        }
    }

    fn is_expired(&self, record: &JobRecord, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(record.updated_at) > self.ttl
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Periodically evicts expired records until the handle is aborted.
    pub fn spawn_evictor(self: Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let evicted = self.evict_expired().await;
                if evicted > 0 {
                    debug!("Evicted {} expired jobs", evicted);
                }
            }
        })
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn put(&self, record: JobRecord) {
        self.records.write().await.insert(record.id, record);
    }

    async fn get(&self, id: Uuid) -> Option<JobRecord> {
        let records = self.records.read().await;
        records
            .get(&id)
            .filter(|record| !self.is_expired(record, Utc::now()))
            .cloned()
    }

    async fn update_status(&self, id: Uuid, update: JobUpdate) -> Result<(), TaskStoreError> {
        let now = Utc::now();
        let mut records = self.records.write().await;

        let (expired, finished) = match records.get(&id) {
            Some(record) => (self.is_expired(record, now), record.status.is_terminal()),
            None => return Err(TaskStoreError::NotFound(id)),
        };
        if expired {
            records.remove(&id);
            return Err(TaskStoreError::NotFound(id));
        }
        if finished {
            return Err(TaskStoreError::AlreadyFinished(id));
        }

        if let Some(record) = records.get_mut(&id) {
            record.apply(update);
        }
        Ok(())
    }

    async fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !self.is_expired(record, now));
        before - records.len()
    }
}
