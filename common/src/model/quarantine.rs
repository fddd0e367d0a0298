use serde::{Deserialize, Serialize};

/// Audit row describing one staging record rejected by validation.
///
/// Records are append-only: the quarantine manager writes them and nothing in
/// the pipeline updates or deletes them afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantineRecord {
    /// Assigned by the store, `None` until the record is persisted.
    pub id: Option<i64>,
    pub run_timestamp: String,
    pub source_table: String,
    pub pk_column_name: String,
    /// Stringified natural key of the failed row.
    pub pk_value: String,
    /// Width of the failed row.
    pub total_columns: i64,
    /// Every violated rule for the row, joined and bounded in length.
    pub validation_error: String,
}
