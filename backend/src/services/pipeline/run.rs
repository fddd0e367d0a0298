//! # Pipeline Run Service
//!
//! `POST /api/pipeline/run` schedules one full pipeline run and returns at once
//! with the job id the client polls on.
//!
//! ## Workflow:
//!
//! 1.  `schedule_run_job` registers a `Pending` job and spawns a Tokio task.
//! 2.  The task waits for the run lock, then moves the run onto the blocking
//!     pool with `tokio::task::spawn_blocking`, since SQLite access and rule
//!     evaluation are synchronous.
//! 3.  `run_blocking` builds the pipeline from configuration, runs it and
//!     reports `InProgress(tables_done)` through the job channel after every
//!     staging table.
//! 4.  The final `RunSummary` is stored as JSON in `Completed`; a pipeline that
//!     cannot be built (bad schema, unreachable database) ends in `Failed`.

use crate::config::AppConfig;
use crate::job_controller::state::{JobUpdate, JobsState};
use crate::pipeline::Pipeline;
use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use common::jobs::JobStatus;
use log::{error, info};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Serialize)]
struct RunStarted {
    job_id: String,
}

pub(crate) async fn process(
    jobs_state: web::Data<JobsState>,
    config: web::Data<AppConfig>,
) -> impl Responder {
    let job_id = schedule_run_job(jobs_state.get_ref().clone(), config.get_ref().clone()).await;
    HttpResponse::Ok().json(RunStarted { job_id })
}

pub async fn schedule_run_job(state: JobsState, config: AppConfig) -> String {
    let job_id = state.create_job().await;
    let value = job_id.clone();

    tokio::spawn(async move {
        let _guard = state.run_lock.clone().lock_owned().await;
        let tx = state.tx.clone();
        let id_for_blocking = value.clone();

        let handle =
            tokio::task::spawn_blocking(move || run_blocking(&config, &tx, &id_for_blocking));

        let status = match handle.await {
            Ok(Ok(summary)) => JobStatus::Completed(summary),
            Ok(Err(e)) => {
                error!("Pipeline job {} failed: {}", value, e);
                JobStatus::Failed(e)
            }
            Err(join_err) => JobStatus::Failed(format!("join error: {}", join_err)),
        };
        state.set_status(&value, status).await;
    });

    job_id
}

fn run_blocking(
    config: &AppConfig,
    tx: &mpsc::Sender<JobUpdate>,
    job_id: &str,
) -> Result<String, String> {
    let mut pipeline = Pipeline::from_config(config).map_err(|e| e.to_string())?;
    let _ = tx.blocking_send(JobUpdate::new(job_id, JobStatus::InProgress(0)));

    let summary = pipeline.run_with_progress(Utc::now(), |done| {
        let _ = tx.blocking_send(JobUpdate::new(job_id, JobStatus::InProgress(done)));
    });
    info!(
        "Pipeline job {} finished ({} tables, all completed: {})",
        job_id,
        summary.tables.len(),
        summary.succeeded()
    );
    serde_json::to_string(&summary).map_err(|e| e.to_string())
}
