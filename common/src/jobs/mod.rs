use serde::Serialize;

/// Lifecycle of a background pipeline run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Pending,
    /// Number of staging tables finished so far.
    InProgress(u32),
    /// JSON-encoded run summary.
    Completed(String),
    Failed(String),
}
