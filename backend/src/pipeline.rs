//! Run orchestration: ingest every source, then validate, quarantine and
//! promote the unprocessed rows of each staging table.

use crate::config::AppConfig;
use crate::error::Result;
use crate::promote::promote;
use crate::quarantine::{partition, QuarantineContext, DEFAULT_MAX_ERROR_LEN};
use crate::sources::fetch::{FileFetcher, SourceFetcher};
use crate::sources::{adapter_for, SourceDescriptor};
use crate::store::{RecordStore, RowFilter, Table};
use crate::validation::schema::SchemaRegistry;
use crate::validation::{count_duplicate_keys, validate, ValidationOutcome};
use chrono::{DateTime, Utc};
use common::model::audit::DqAuditEntry;
use common::model::platform::SourcePlatform;
use common::model::summary::{RunSummary, TableRunStatus, TableRunSummary};
use log::{error, info, warn};

/// Timestamp layout shared by `ingested_at`, `run_timestamp` and the
/// dimension audit columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub chunk_size: usize,
    pub max_error_len: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            max_error_len: DEFAULT_MAX_ERROR_LEN,
        }
    }
}

pub struct Pipeline {
    store: RecordStore,
    registry: SchemaRegistry,
    fetcher: Box<dyn SourceFetcher>,
    sources: Vec<SourceDescriptor>,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Fails with `SchemaNotFound` when a configured source lands in a staging
    /// table that has no registered schema.
    pub fn new(
        store: RecordStore,
        registry: SchemaRegistry,
        fetcher: Box<dyn SourceFetcher>,
        sources: Vec<SourceDescriptor>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        for source in &sources {
            registry.get(source.platform.staging_table())?;
        }
        store.ensure_tables()?;
        Ok(Pipeline {
            store,
            registry,
            fetcher,
            sources,
            settings,
        })
    }

    /// Opens the configured database and reads sources from disk.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Pipeline::new(
            RecordStore::open(&config.database_path)?,
            config.registry()?,
            Box::new(FileFetcher),
            config.sources.clone(),
            config.settings(),
        )
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    /// Fetches, normalizes and stages one source. Returns the rows staged.
    ///
    /// Records still pending from an earlier run are not staged twice, and a
    /// changed record replaces its pending predecessor.
    pub fn ingest(&mut self, source: &SourceDescriptor, ingested_at: &str) -> Result<usize> {
        let raw = self.fetcher.fetch(source);
        if raw.is_empty() {
            info!("Source '{}' returned no records", source.name);
            return Ok(0);
        }
        let batch = adapter_for(source.platform).normalize(&raw);
        let schema = self.registry.get(source.platform.staging_table())?;
        let report = self.store.stage_new(
            source.platform,
            &batch,
            &schema.natural_key,
            ingested_at,
            self.settings.chunk_size,
        )?;
        info!(
            "Staged {} of {} fetched records from '{}' into {} ({} already pending, {} superseded)",
            report.staged,
            raw.len(),
            source.name,
            source.platform.staging_table(),
            report.unchanged,
            report.superseded
        );
        Ok(report.staged)
    }

    /// Validates, quarantines and promotes the unprocessed rows of one table.
    pub fn process_table(
        &mut self,
        platform: SourcePlatform,
        run_timestamp: &str,
    ) -> Result<TableRunSummary> {
        let table = Table::Staging(platform);
        let adapter = adapter_for(platform);
        let schema = self.registry.get(table.name())?;
        let mut summary = TableRunSummary::new(table.name());

        let batch = self.store.query(table, RowFilter::Unprocessed)?;
        if batch.is_empty() {
            info!("No unprocessed rows in '{}'", table.name());
            return Ok(summary);
        }
        let total_rows = batch.len();
        let duplicate_keys = count_duplicate_keys(&batch, &schema.natural_key);

        let failures = match validate(&batch, schema)? {
            ValidationOutcome::Rejected(rejection) => {
                warn!("Batch for '{}' rejected: {}", table.name(), rejection.reason);
                summary.status = TableRunStatus::Rejected(rejection.reason.clone());
                self.audit(&DqAuditEntry {
                    id: None,
                    table_name: table.name().to_string(),
                    run_timestamp: run_timestamp.to_string(),
                    total_rows: total_rows as i64,
                    duplicate_keys: rejection.duplicate_keys as i64,
                    validation_passed: false,
                    quarantined: 0,
                    promoted: 0,
                    detail: Some(rejection.reason),
                });
                return Ok(summary);
            }
            ValidationOutcome::Clean => Default::default(),
            ValidationOutcome::Failed(failures) => failures,
        };
        let validation_passed = failures.is_empty();
        let pk_column = schema.natural_key.clone();

        let ctx = QuarantineContext {
            table,
            pk_column: &pk_column,
            run_timestamp,
            max_error_len: self.settings.max_error_len,
            chunk_size: self.settings.chunk_size,
        };
        let split = partition(&mut self.store, batch, &failures, &ctx)?;
        summary.quarantined = split.quarantined;
        summary.validated_clean = split.clean.len();

        summary.promoted = promote(&mut self.store, adapter, &split.clean, run_timestamp)?;

        self.audit(&DqAuditEntry {
            id: None,
            table_name: table.name().to_string(),
            run_timestamp: run_timestamp.to_string(),
            total_rows: total_rows as i64,
            duplicate_keys: duplicate_keys as i64,
            validation_passed,
            quarantined: summary.quarantined as i64,
            promoted: summary.promoted as i64,
            detail: None,
        });
        Ok(summary)
    }

    pub fn run(&mut self) -> RunSummary {
        self.run_at(Utc::now())
    }

    pub fn run_at(&mut self, now: DateTime<Utc>) -> RunSummary {
        self.run_with_progress(now, |_| {})
    }

    /// Runs every source and table. A failing table is reported in the summary
    /// and does not stop the others. `on_table_done` receives the number of
    /// tables finished so far.
    pub fn run_with_progress<F>(&mut self, now: DateTime<Utc>, mut on_table_done: F) -> RunSummary
    where
        F: FnMut(u32),
    {
        let run_timestamp = format_timestamp(now);
        info!("Pipeline run {} started", run_timestamp);

        let mut platforms: Vec<SourcePlatform> = Vec::new();
        let mut ingested: Vec<(SourcePlatform, usize)> = Vec::new();
        let mut ingest_errors: Vec<(SourcePlatform, String)> = Vec::new();

        for source in self.sources.clone() {
            if !platforms.contains(&source.platform) {
                platforms.push(source.platform);
            }
            match self.ingest(&source, &run_timestamp) {
                Ok(n) => match ingested.iter_mut().find(|(p, _)| *p == source.platform) {
                    Some((_, total)) => *total += n,
                    None => ingested.push((source.platform, n)),
                },
                Err(e) => {
                    error!("Ingest of '{}' failed: {}", source.name, e);
                    ingest_errors.push((source.platform, format!("ingest of '{}': {}", source.name, e)));
                }
            }
        }

        let mut tables = Vec::with_capacity(platforms.len());
        for (done, platform) in platforms.into_iter().enumerate() {
            let staged = ingested
                .iter()
                .find(|(p, _)| *p == platform)
                .map_or(0, |(_, n)| *n);

            let mut summary = match ingest_errors.iter().find(|(p, _)| *p == platform) {
                Some((_, reason)) => {
                    let mut failed = TableRunSummary::new(platform.staging_table());
                    failed.status = TableRunStatus::Failed(reason.clone());
                    failed
                }
                None => match self.process_table(platform, &run_timestamp) {
                    Ok(summary) => summary,
                    Err(e) => {
                        error!("Processing '{}' failed: {}", platform.staging_table(), e);
                        self.audit(&DqAuditEntry {
                            id: None,
                            table_name: platform.staging_table().to_string(),
                            run_timestamp: run_timestamp.clone(),
                            total_rows: 0,
                            duplicate_keys: 0,
                            validation_passed: false,
                            quarantined: 0,
                            promoted: 0,
                            detail: Some(e.to_string()),
                        });
                        let mut failed = TableRunSummary::new(platform.staging_table());
                        failed.status = TableRunStatus::Failed(e.to_string());
                        failed
                    }
                },
            };
            summary.ingested = staged;
            tables.push(summary);
            on_table_done(done as u32 + 1);
        }

        let summary = RunSummary {
            run_timestamp,
            tables,
        };
        for t in &summary.tables {
            info!(
                "  {}: ingested={} clean={} quarantined={} promoted={} status={:?}",
                t.table, t.ingested, t.validated_clean, t.quarantined, t.promoted, t.status
            );
        }
        summary
    }

    fn audit(&self, entry: &DqAuditEntry) {
        if let Err(e) = self.store.append_audit(entry) {
            warn!("Could not write audit entry for '{}': {}", entry.table_name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::fetch::InMemoryFetcher;
    use crate::sources::RawRecord;
    use chrono::TimeZone;
    use serde_json::json;

    fn gfg_source() -> SourceDescriptor {
        SourceDescriptor {
            name: "gfg-export".to_string(),
            platform: SourcePlatform::Gfg,
            location: "gfg.csv".into(),
        }
    }

    fn gfg_row(slug: &str, title: &str) -> RawRecord {
        match json!({
            "title": title,
            "author_id": "jdoe",
            "last_updated": "12 Mar, 2023",
            "link": format!("https://www.geeksforgeeks.org/{}/", slug),
            "category": "easy"
        }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn pipeline(records: Vec<RawRecord>) -> Pipeline {
        let mut fetcher = InMemoryFetcher::new();
        fetcher.insert("gfg-export", records);
        Pipeline::new(
            RecordStore::open_in_memory().unwrap(),
            SchemaRegistry::builtin(100).unwrap(),
            Box::new(fetcher),
            vec![gfg_source()],
            PipelineSettings::default(),
        )
        .unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, hour, 0, 0).unwrap()
    }

    #[test]
    fn timestamps_carry_microseconds() {
        assert_eq!(format_timestamp(at(14)), "2025-06-10 14:00:00.000000");
    }

    #[test]
    fn run_splits_clean_and_failing_rows() {
        let mut p = pipeline(vec![
            gfg_row("binary-search", "Binary search"),
            gfg_row("quick-sort", "ab"),
        ]);
        let mut progress = Vec::new();
        let summary = p.run_with_progress(at(14), |n| progress.push(n));
        let t = summary.table("stg_gfg_articles").unwrap();
        assert_eq!(t.ingested, 2);
        assert_eq!(t.validated_clean, 1);
        assert_eq!(t.quarantined, 1);
        assert_eq!(t.promoted, 1);
        assert_eq!(t.status, TableRunStatus::Completed);
        assert_eq!(progress, vec![1]);

        let audit = p.store().audit_entries("stg_gfg_articles").unwrap();
        assert_eq!(audit.len(), 1);
        assert!(!audit[0].validation_passed);
        assert_eq!(audit[0].quarantined, 1);
    }

    #[test]
    fn pending_failures_are_not_staged_again() {
        let mut p = pipeline(vec![
            gfg_row("binary-search", "Binary search"),
            gfg_row("quick-sort", "ab"),
        ]);
        p.run_at(at(14));
        let summary = p.run_at(at(15));
        let t = summary.table("stg_gfg_articles").unwrap();
        assert_eq!(t.ingested, 1);
        assert_eq!(t.quarantined, 1);
        assert_eq!(t.promoted, 1);
        let audit = p.store().audit_entries("stg_gfg_articles").unwrap();
        assert_eq!(audit[1].total_rows, 2);
        assert_eq!(audit[1].duplicate_keys, 0);
    }

    #[test]
    fn unconfigured_tables_are_not_processed() {
        let mut p = pipeline(vec![]);
        let summary = p.run_at(at(14));
        assert_eq!(summary.tables.len(), 1);
        assert!(summary.table("stg_medium_articles").is_none());
    }
}
