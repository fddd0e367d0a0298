use common::model::platform::SourcePlatform;
use common::model::staging::{GfgStagingRecord, MediumStagingRecord};

/// Columns every staging table carries in addition to its payload.
pub const STAGING_META_COLUMNS: [&str; 3] = ["id", "ingested_at", "processed"];

/// Logical tables owned by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Staging(SourcePlatform),
    Quarantine,
    DimArticles,
    AuditLog,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Staging(SourcePlatform::Gfg),
        Table::Staging(SourcePlatform::Medium),
        Table::Quarantine,
        Table::DimArticles,
        Table::AuditLog,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Staging(platform) => platform.staging_table(),
            Table::Quarantine => "dq_quarantine",
            Table::DimArticles => "dim_articles",
            Table::AuditLog => "dq_audit_log",
        }
    }

    /// Resolves a table by its physical name.
    pub fn from_name(name: &str) -> Option<Table> {
        Table::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Column definitions, without the `CREATE TABLE` prefix.
    pub fn definition(&self) -> String {
        match self {
            Table::Staging(platform) => {
                let payload: &[&str] = match platform {
                    SourcePlatform::Gfg => &GfgStagingRecord::COLUMNS,
                    SourcePlatform::Medium => &MediumStagingRecord::COLUMNS,
                };
                let mut cols = vec![
                    "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
                    "\"ingested_at\" TEXT NOT NULL".to_string(),
                    "\"processed\" INTEGER NOT NULL DEFAULT 0".to_string(),
                ];
                cols.extend(payload.iter().map(|c| format!("\"{}\" TEXT", c)));
                cols.join(",\n    ")
            }
            Table::Quarantine => r#""id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "run_timestamp" TEXT NOT NULL,
    "source_table" TEXT NOT NULL,
    "pk_column_name" TEXT NOT NULL,
    "pk_value" TEXT NOT NULL,
    "total_columns" INTEGER NOT NULL,
    "validation_error" TEXT NOT NULL"#
                .to_string(),
            Table::DimArticles => r#""id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "article_id" TEXT NOT NULL UNIQUE,
    "source_platform" TEXT NOT NULL CHECK ("source_platform" IN ('GFG', 'Medium')),
    "title" TEXT NOT NULL,
    "author" TEXT,
    "pub_date" TEXT,
    "link" TEXT,
    "category" TEXT,
    "is_valid" INTEGER NOT NULL DEFAULT 1,
    "created_at" TEXT NOT NULL,
    "updated_at" TEXT NOT NULL"#
                .to_string(),
            Table::AuditLog => r#""id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "table_name" TEXT NOT NULL,
    "run_timestamp" TEXT NOT NULL,
    "total_rows" INTEGER NOT NULL,
    "duplicate_keys" INTEGER NOT NULL,
    "validation_passed" INTEGER NOT NULL,
    "quarantined" INTEGER NOT NULL,
    "promoted" INTEGER NOT NULL,
    "detail" TEXT"#
                .to_string(),
        }
    }
}

/// Double-quotes an identifier for interpolation into SQL.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
