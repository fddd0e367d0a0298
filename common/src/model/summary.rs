use serde::{Deserialize, Serialize};

/// Terminal state of one staging table within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableRunStatus {
    /// Validation, quarantine and promotion all ran.
    Completed,
    /// The batch was refused by a pre-check before per-row validation.
    Rejected(String),
    /// A structural or storage error stopped this table.
    Failed(String),
}

/// Per-table counters reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRunSummary {
    pub table: String,
    pub ingested: usize,
    pub validated_clean: usize,
    pub quarantined: usize,
    pub promoted: usize,
    pub status: TableRunStatus,
}

impl TableRunSummary {
    pub fn new(table: &str) -> Self {
        TableRunSummary {
            table: table.to_string(),
            ingested: 0,
            validated_clean: 0,
            quarantined: 0,
            promoted: 0,
            status: TableRunStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_timestamp: String,
    pub tables: Vec<TableRunSummary>,
}

impl RunSummary {
    pub fn table(&self, name: &str) -> Option<&TableRunSummary> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// True when every table completed.
    pub fn succeeded(&self) -> bool {
        self.tables
            .iter()
            .all(|t| t.status == TableRunStatus::Completed)
    }
}
