//! Shared state for background pipeline runs.
//!
//! - `JobsState`: cloneable handle injected into the Actix app as `web::Data`.
//!   It holds the status of every job and the sender half of the update channel.
//! - `JobUpdate`: a status change pushed by a running job.
//! - `start_job_updater`: long-running task that drains the channel into the
//!   job map.
//!
//! Runs write to the same SQLite file, so `run_lock` makes them take turns.

use common::jobs::JobStatus;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, Mutex, RwLock};

#[derive(Clone)]
pub struct JobsState {
    /// Job id → latest status. Read by the status endpoint, written by
    /// `start_job_updater` and by the task that awaits each run.
    pub jobs: Arc<RwLock<HashMap<String, JobStatus>>>,

    /// Progress updates sent from inside blocking runs.
    pub tx: mpsc::Sender<JobUpdate>,

    /// Held for the whole duration of a pipeline run.
    pub run_lock: Arc<Mutex<()>>,
}

impl JobsState {
    pub fn new(tx: mpsc::Sender<JobUpdate>) -> Self {
        JobsState {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tx,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Registers a new job as `Pending` and returns its id.
    pub async fn create_job(&self) -> String {
        let job_id = uuid::Uuid::new_v4().to_string();
        self.jobs
            .write()
            .await
            .insert(job_id.clone(), JobStatus::Pending);
        job_id
    }

    pub async fn set_status(&self, job_id: &str, status: JobStatus) {
        self.jobs.write().await.insert(job_id.to_string(), status);
    }

    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(job_id).cloned()
    }
}

#[derive(Debug)]
pub struct JobUpdate {
    pub(crate) job_id: String,
    pub(crate) status: JobStatus,
}

impl JobUpdate {
    pub fn new(job_id: &str, status: JobStatus) -> Self {
        JobUpdate {
            job_id: job_id.to_string(),
            status,
        }
    }
}

/// Applies every `JobUpdate` received on `rx` to the shared job map until all
/// senders are dropped.
pub async fn start_job_updater(state: JobsState, mut rx: mpsc::Receiver<JobUpdate>) {
    while let Some(update) = rx.recv().await {
        let mut jobs = state.jobs.write().await;
        // A late progress update must not overwrite a finished job.
        if matches!(
            jobs.get(&update.job_id),
            Some(JobStatus::Completed(_)) | Some(JobStatus::Failed(_))
        ) {
            continue;
        }
        jobs.insert(update.job_id, update.status);
    }
}
