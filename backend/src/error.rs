//! Error taxonomy for the pipeline.
//!
//! Row-level validation failures are not errors: they travel as data through
//! the `FailureSet` and end up in `dq_quarantine`. Everything here stops the
//! affected table for the current run and is surfaced to the orchestrator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No validation schema is registered for a staging table.
    #[error("schema not found for table '{0}'")]
    SchemaNotFound(String),

    /// A declared column is absent from the batch, so failures cannot be
    /// attributed to individual rows.
    #[error("required column '{column}' is missing from batch for table '{table}'")]
    MissingColumn { table: String, column: String },

    /// A schema declaration could not be compiled.
    #[error("invalid schema for table '{table}': {reason}")]
    InvalidSchema { table: String, reason: String },

    /// A clean row could not be turned into a dimension row.
    #[error("cannot map row {row} of '{table}' to dim_articles: {reason}")]
    Mapping {
        table: String,
        row: usize,
        reason: String,
    },

    /// Fewer staging rows were flagged than were promoted.
    #[error("expected to mark {expected} rows processed in '{table}', updated {updated}")]
    ProcessedMismatch {
        table: String,
        expected: usize,
        updated: usize,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Structural errors come from configuration or batch shape and will not
    /// go away by retrying the same run.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PipelineError::SchemaNotFound(_)
                | PipelineError::MissingColumn { .. }
                | PipelineError::InvalidSchema { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
