use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{JobRecord, JobUpdate, TaskStore, TaskStoreError};
use crate::agents::{Coordinator, Task};

/// Runs tasks in the background and records their progress in a [`TaskStore`].
#[derive(Clone)]
pub struct JobRunner {
    coordinator: Arc<Coordinator>,
    store: Arc<dyn TaskStore>,
    running: Arc<Mutex<HashMap<Uuid, AbortHandle>>>,
}

impl JobRunner {
    pub fn new(coordinator: Arc<Coordinator>, store: Arc<dyn TaskStore>) -> Self {
        Self {
            coordinator,
            store,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Queues `task` and returns its job id immediately.
    pub async fn submit(&self, task: Task) -> Uuid {
        let record = JobRecord::queued();
        let id = record.id;
        self.store.put(record).await;
        info!("Queued job {} for: {}", id, task.query_preview(50));

        let coordinator = self.coordinator.clone();
        let store = self.store.clone();
        let running = self.running.clone();

        // Held across the spawn so the entry exists before the job can remove it.
        let mut guard = self.running.lock().await;
        let handle = tokio::spawn(async move {
            run_job(coordinator, store, id, task).await;
            running.lock().await.remove(&id);
        });
        guard.insert(id, handle.abort_handle());

        id
    }

    /// Marks the job cancelled and aborts it if it is still running.
    pub async fn cancel(&self, id: Uuid) -> Result<(), TaskStoreError> {
        self.store.update_status(id, JobUpdate::cancelled()).await?;
        if let Some(handle) = self.running.lock().await.remove(&id) {
            handle.abort();
        }
        info!("Cancelled job {}", id);
        Ok(())
    }

    pub async fn status(&self, id: Uuid) -> Option<JobRecord> {
        self.store.get(id).await
    }
}

async fn run_job(coordinator: Arc<Coordinator>, store: Arc<dyn TaskStore>, id: Uuid, task: Task) {
    if let Err(e) = store.update_status(id, JobUpdate::processing()).await {
        warn!("Job {} not started: {}", id, e);
        return;
    }

    let update = match coordinator.process_task(&task).await {
        Ok(output) => JobUpdate::completed(output),
        Err(e) => {
            error!("Background job {} failed: {}", id, e);
            JobUpdate::failed(e.to_string())
        }
    };

    if let Err(e) = store.update_status(id, update).await {
        warn!("Job {} result not recorded: {}", id, e);
    }
}
