use serde::{Deserialize, Serialize};

/// One `dq_audit_log` row, written per table per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqAuditEntry {
    pub id: Option<i64>,
    pub table_name: String,
    pub run_timestamp: String,
    pub total_rows: i64,
    pub duplicate_keys: i64,
    pub validation_passed: bool,
    pub quarantined: i64,
    pub promoted: i64,
    pub detail: Option<String>,
}
