//! # Pipeline Service Module
//!
//! Routes under `/api/pipeline` start ingestion runs and report on them.
//!
//! ## Sub-modules:
//! - `run`: schedules a full run (ingest → validate → quarantine → promote) as a
//!   background job and answers with its id.
//! - `get_status`: returns the `JobStatus` of a run.

mod get_status;
mod run;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/pipeline";

/// # Registered Routes:
///
/// *   **`POST /run`**: starts a run, returns `{"job_id": "..."}`.
/// *   **`GET /status/{job_id}`**: `Pending`, `InProgress(tables_done)`,
///     `Completed(summary_json)` or `Failed(reason)`; `404` for unknown ids.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/run", post().to(run::process))
        .route("/status/{job_id}", get().to(get_status::process))
}
