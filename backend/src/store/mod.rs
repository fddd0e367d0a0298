//! SQLite-backed record store.
//!
//! The store owns every physical row. Pipeline stages only append rows, flip
//! the `processed` flag on staging rows, and upsert `dim_articles`; nothing
//! here deletes data.

pub mod tables;

use crate::batch::{CanonicalBatch, StagingRow};
use crate::error::{PipelineError, Result};
use common::model::audit::DqAuditEntry;
use common::model::dimension::{DimArticle, DimensionStats};
use common::model::platform::SourcePlatform;
use common::model::quarantine::QuarantineRecord;
use log::{debug, info, warn};
use rusqlite::types::{Type, Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
pub use tables::Table;
use tables::{quote_ident, STAGING_META_COLUMNS};

/// Upper bound on bound parameters in one SQLite statement.
pub const SQLITE_MAX_PARAMS: usize = 32_766;

const QUARANTINE_COLUMNS: [&str; 6] = [
    "run_timestamp",
    "source_table",
    "pk_column_name",
    "pk_value",
    "total_columns",
    "validation_error",
];

const UPSERT_DIM_ARTICLE: &str = "INSERT INTO dim_articles \
    (article_id, source_platform, title, author, pub_date, link, category, is_valid, created_at, updated_at) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
    ON CONFLICT(article_id) DO UPDATE SET \
        source_platform = excluded.source_platform, \
        title = excluded.title, \
        author = excluded.author, \
        pub_date = excluded.pub_date, \
        link = excluded.link, \
        category = excluded.category, \
        is_valid = excluded.is_valid, \
        updated_at = excluded.updated_at";

const DIM_ARTICLE_COLUMNS: &str = "id, article_id, source_platform, title, author, pub_date, \
    link, category, is_valid, created_at, updated_at";

/// What `RecordStore::stage_new` did with a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    pub staged: usize,
    /// Rows already pending from an earlier ingest.
    pub unchanged: usize,
    /// Older pending rows replaced by a newer version of their key.
    pub superseded: usize,
}

/// Row predicate for `RecordStore::query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    All,
    /// Staging rows not yet promoted.
    Unprocessed,
    Processed,
}

impl RowFilter {
    fn clause(&self) -> &'static str {
        match self {
            RowFilter::All => "",
            RowFilter::Unprocessed => "WHERE \"processed\" = 0",
            RowFilter::Processed => "WHERE \"processed\" = 1",
        }
    }
}

pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    /// Opens (or creates) the database file, creating its directory if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        info!("DB connected: {}", path.display());
        Ok(RecordStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(RecordStore {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Creates `table` if it does not exist. Returns whether it was created.
    pub fn create_table(&self, table: Table) -> Result<bool> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table.name()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            quote_ident(table.name()),
            table.definition()
        ))?;
        if exists {
            debug!("Table '{}' already exists", table.name());
        } else {
            info!("Table '{}' created", table.name());
        }
        Ok(!exists)
    }

    pub fn ensure_tables(&self) -> Result<()> {
        for table in Table::ALL {
            self.create_table(table)?;
        }
        Ok(())
    }

    /// Appends `rows` to `table` in chunks, all inside one transaction.
    ///
    /// Chunks are clamped so no statement exceeds `SQLITE_MAX_PARAMS`. A failing
    /// chunk is rolled back and retried row by row; if a single row still fails
    /// nothing from this call is kept.
    pub fn append_rows(
        &mut self,
        table: Table,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
        chunk_size: usize,
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(PipelineError::Config(format!(
                "row width {} does not match {} columns of '{}'",
                bad.len(),
                columns.len(),
                table.name()
            )));
        }
        let mut tx = self.conn.transaction()?;
        let written = insert_chunked(&mut tx, table.name(), columns, rows, chunk_size)?;
        tx.commit()?;
        debug!("Appended {} rows to '{}'", written, table.name());
        Ok(written)
    }

    /// Writes a normalized batch into the platform's staging table.
    pub fn stage(
        &mut self,
        platform: SourcePlatform,
        batch: &CanonicalBatch,
        ingested_at: &str,
        chunk_size: usize,
    ) -> Result<usize> {
        let (columns, rows) = staging_values(batch, 0..batch.len(), ingested_at);
        self.append_rows(Table::Staging(platform), &columns, &rows, chunk_size)
    }

    /// Stages `batch`, reconciling it with rows still pending from earlier
    /// ingests so every key keeps a single pending version.
    ///
    /// - A row identical to a pending row from an earlier ingest is not staged
    ///   again.
    /// - A row whose `key_column` value has older pending rows is the newest
    ///   version of that key: the older rows are flagged processed.
    ///
    /// Pending rows sharing `ingested_at` are left alone, so duplicates within
    /// one ingest still reach validation. Staging and flagging commit together.
    pub fn stage_new(
        &mut self,
        platform: SourcePlatform,
        batch: &CanonicalBatch,
        key_column: &str,
        ingested_at: &str,
        chunk_size: usize,
    ) -> Result<StageReport> {
        let table = Table::Staging(platform);
        let pending = self.query(table, RowFilter::Unprocessed)?;

        // Payload -> newest pending id, and key -> every pending id.
        let mut known: HashMap<Vec<Option<&str>>, i64> = HashMap::new();
        let mut by_key: HashMap<&str, Vec<i64>> = HashMap::new();
        for (r, row) in pending.rows().iter().enumerate() {
            let id = match row.id {
                Some(id) if row.ingested_at.as_deref() != Some(ingested_at) => id,
                _ => continue,
            };
            known.insert(payload(&pending, r, batch.columns()), id);
            if let Some(key) = pending.value(r, key_column).filter(|k| !k.trim().is_empty()) {
                by_key.entry(key).or_default().push(id);
            }
        }

        let mut report = StageReport::default();
        let mut fresh = Vec::with_capacity(batch.len());
        let mut retire: Vec<i64> = Vec::new();
        for r in 0..batch.len() {
            let keep = known.get(&payload(batch, r, batch.columns())).copied();
            if let Some(older) = batch.value(r, key_column).and_then(|k| by_key.remove(k)) {
                retire.extend(older.into_iter().filter(|id| Some(*id) != keep));
            }
            match keep {
                Some(_) => report.unchanged += 1,
                None => fresh.push(r),
            }
        }

        let (columns, rows) = staging_values(batch, fresh, ingested_at);
        let mut tx = self.conn.transaction()?;
        report.staged = insert_chunked(&mut tx, table.name(), &columns, &rows, chunk_size)?;
        report.superseded = update_flag_in(&tx, table.name(), "id", &retire, true)?;
        tx.commit()?;
        debug!(
            "Staged {} rows into '{}' ({} unchanged, {} superseded)",
            report.staged,
            table.name(),
            report.unchanged,
            report.superseded
        );
        Ok(report)
    }

    /// Reads `table` ordered by surrogate id.
    ///
    /// The batch columns are whatever the physical table holds minus `id`,
    /// `ingested_at` and `processed`, so a table missing a column yields a
    /// batch missing it too.
    pub fn query(&self, table: Table, filter: RowFilter) -> Result<CanonicalBatch> {
        let sql = format!(
            "SELECT * FROM {} {} ORDER BY \"id\"",
            quote_ident(table.name()),
            filter.clause()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let id_idx = names.iter().position(|n| n == "id");
        let ingested_idx = names.iter().position(|n| n == "ingested_at");
        let payload: Vec<(usize, String)> = names
            .iter()
            .enumerate()
            .filter(|(_, n)| !STAGING_META_COLUMNS.contains(&n.as_str()))
            .map(|(i, n)| (i, n.clone()))
            .collect();

        let mut batch = CanonicalBatch::new(payload.iter().map(|(_, n)| n.clone()));
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let id = match id_idx {
                Some(i) => row.get::<_, Option<i64>>(i)?,
                None => None,
            };
            let ingested_at = match ingested_idx {
                Some(i) => value_to_string(row.get_ref(i)?),
                None => None,
            };
            let values = payload
                .iter()
                .map(|(i, _)| row.get_ref(*i).map(value_to_string))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            batch.push(StagingRow {
                id,
                ingested_at,
                values,
            });
        }
        Ok(batch)
    }

    /// Sets `processed = flag` for the rows whose `pk_column` is in `pk_values`.
    pub fn update_flag(
        &mut self,
        table: Table,
        pk_column: &str,
        pk_values: &[i64],
        flag: bool,
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let updated = update_flag_in(&tx, table.name(), pk_column, pk_values, flag)?;
        tx.commit()?;
        Ok(updated)
    }

    pub fn append_quarantine(
        &mut self,
        records: &[QuarantineRecord],
        chunk_size: usize,
    ) -> Result<usize> {
        let rows: Vec<Vec<SqlValue>> = records
            .iter()
            .map(|r| {
                vec![
                    SqlValue::Text(r.run_timestamp.clone()),
                    SqlValue::Text(r.source_table.clone()),
                    SqlValue::Text(r.pk_column_name.clone()),
                    SqlValue::Text(r.pk_value.clone()),
                    SqlValue::Integer(r.total_columns),
                    SqlValue::Text(r.validation_error.clone()),
                ]
            })
            .collect();
        self.append_rows(Table::Quarantine, &QUARANTINE_COLUMNS, &rows, chunk_size)
    }

    /// Quarantine audit trail, newest first.
    pub fn quarantine_records(
        &self,
        source_table: Option<&str>,
        limit: usize,
    ) -> Result<Vec<QuarantineRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_timestamp, source_table, pk_column_name, pk_value, total_columns, validation_error \
             FROM dq_quarantine WHERE (?1 IS NULL OR source_table = ?1) ORDER BY id DESC LIMIT ?2",
        )?;
        let records = stmt
            .query_map(params![source_table, limit as i64], |row| {
                Ok(QuarantineRecord {
                    id: row.get(0)?,
                    run_timestamp: row.get(1)?,
                    source_table: row.get(2)?,
                    pk_column_name: row.get(3)?,
                    pk_value: row.get(4)?,
                    total_columns: row.get(5)?,
                    validation_error: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Upserts `articles` and flags `staging_ids` processed in one transaction.
    ///
    /// Any failure, including fewer flagged rows than ids given, leaves both
    /// tables untouched.
    pub fn promote_articles(
        &mut self,
        staging: Table,
        articles: &[DimArticle],
        staging_ids: &[i64],
        promoted_at: &str,
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT_DIM_ARTICLE)?;
            for article in articles {
                stmt.execute(params![
                    article.article_id,
                    article.source_platform.label(),
                    article.title,
                    article.author,
                    article.pub_date,
                    article.link,
                    article.category,
                    article.is_valid,
                    promoted_at,
                    promoted_at,
                ])?;
            }
        }
        let updated = update_flag_in(&tx, staging.name(), "id", staging_ids, true)?;
        if updated != staging_ids.len() {
            return Err(PipelineError::ProcessedMismatch {
                table: staging.name().to_string(),
                expected: staging_ids.len(),
                updated,
            });
        }
        tx.commit()?;
        Ok(updated)
    }

    pub fn dim_article(&self, article_id: &str) -> Result<Option<DimArticle>> {
        let sql = format!(
            "SELECT {} FROM dim_articles WHERE article_id = ?1",
            DIM_ARTICLE_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![article_id], dim_article_from_row)
            .optional()?)
    }

    pub fn dim_articles(&self) -> Result<Vec<DimArticle>> {
        let sql = format!(
            "SELECT {} FROM dim_articles ORDER BY article_id",
            DIM_ARTICLE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let articles = stmt
            .query_map([], dim_article_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(articles)
    }

    pub fn count(&self, table: Table) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table.name()));
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Totals per platform and the publication date range of `dim_articles`.
    pub fn dimension_stats(&self) -> Result<DimensionStats> {
        let total = self.count(Table::DimArticles)?;
        let mut stmt = self.conn.prepare(
            "SELECT source_platform, COUNT(*) FROM dim_articles GROUP BY source_platform ORDER BY source_platform",
        )?;
        let per_platform = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let (earliest_pub, latest_pub): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(pub_date), MAX(pub_date) FROM dim_articles WHERE pub_date IS NOT NULL",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(DimensionStats {
            total,
            per_platform,
            earliest_pub,
            latest_pub,
        })
    }

    pub fn append_audit(&self, entry: &DqAuditEntry) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO dq_audit_log \
             (table_name, run_timestamp, total_rows, duplicate_keys, validation_passed, quarantined, promoted, detail) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.table_name,
                entry.run_timestamp,
                entry.total_rows,
                entry.duplicate_keys,
                entry.validation_passed,
                entry.quarantined,
                entry.promoted,
                entry.detail,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn audit_entries(&self, table_name: &str) -> Result<Vec<DqAuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, table_name, run_timestamp, total_rows, duplicate_keys, validation_passed, quarantined, promoted, detail \
             FROM dq_audit_log WHERE table_name = ?1 ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![table_name], |row| {
                Ok(DqAuditEntry {
                    id: row.get(0)?,
                    table_name: row.get(1)?,
                    run_timestamp: row.get(2)?,
                    total_rows: row.get(3)?,
                    duplicate_keys: row.get(4)?,
                    validation_passed: row.get(5)?,
                    quarantined: row.get(6)?,
                    promoted: row.get(7)?,
                    detail: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

fn insert_sql(table: &str, columns: &[&str], rows: usize) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![tuple.as_str(); rows].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table),
        cols,
        values
    )
}

fn insert_chunked(
    tx: &mut Transaction<'_>,
    table: &str,
    columns: &[&str],
    rows: &[Vec<SqlValue>],
    chunk_size: usize,
) -> Result<usize> {
    let max_rows = (SQLITE_MAX_PARAMS / columns.len().max(1)).max(1);
    let chunk_size = chunk_size.clamp(1, max_rows);
    let single = insert_sql(table, columns, 1);
    let mut written = 0;

    for chunk in rows.chunks(chunk_size) {
        let mut sp = tx.savepoint()?;
        let bulk = insert_sql(table, columns, chunk.len());
        match sp.execute(&bulk, params_from_iter(chunk.iter().flatten())) {
            Ok(n) => {
                sp.commit()?;
                written += n;
            }
            Err(e) => {
                warn!(
                    "Bulk insert of {} rows into '{}' failed ({}), retrying row by row",
                    chunk.len(),
                    table,
                    e
                );
                sp.rollback()?;
                for row in chunk {
                    written += sp.execute(&single, params_from_iter(row.iter()))?;
                }
                sp.commit()?;
            }
        }
    }
    Ok(written)
}

fn staging_values<'a>(
    batch: &'a CanonicalBatch,
    rows: impl IntoIterator<Item = usize>,
    ingested_at: &str,
) -> (Vec<&'a str>, Vec<Vec<SqlValue>>) {
    let mut columns = vec!["ingested_at"];
    columns.extend(batch.columns().iter().map(String::as_str));
    let values = rows
        .into_iter()
        .filter_map(|r| batch.rows().get(r))
        .map(|row| {
            let mut values = Vec::with_capacity(columns.len());
            values.push(SqlValue::Text(ingested_at.to_string()));
            values.extend(row.values.iter().map(|v| match v {
                Some(s) => SqlValue::Text(s.clone()),
                None => SqlValue::Null,
            }));
            values
        })
        .collect();
    (columns, values)
}

/// Values of `columns` in row `row`, looked up by name.
fn payload<'a>(batch: &'a CanonicalBatch, row: usize, columns: &[String]) -> Vec<Option<&'a str>> {
    columns.iter().map(|c| batch.value(row, c)).collect()
}

fn update_flag_in(
    conn: &Connection,
    table: &str,
    pk_column: &str,
    pk_values: &[i64],
    flag: bool,
) -> Result<usize> {
    let mut updated = 0;
    for chunk in pk_values.chunks(SQLITE_MAX_PARAMS - 1) {
        let sql = format!(
            "UPDATE {} SET \"processed\" = ? WHERE {} IN ({})",
            quote_ident(table),
            quote_ident(pk_column),
            vec!["?"; chunk.len()].join(", ")
        );
        let mut values = Vec::with_capacity(chunk.len() + 1);
        values.push(SqlValue::Integer(i64::from(flag)));
        values.extend(chunk.iter().map(|v| SqlValue::Integer(*v)));
        updated += conn.execute(&sql, params_from_iter(values.iter()))?;
    }
    Ok(updated)
}

fn value_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

fn dim_article_from_row(row: &Row<'_>) -> rusqlite::Result<DimArticle> {
    let platform: String = row.get(2)?;
    let source_platform = platform
        .parse::<SourcePlatform>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into()))?;
    Ok(DimArticle {
        id: row.get(0)?,
        article_id: row.get(1)?,
        source_platform,
        title: row.get(3)?,
        author: row.get(4)?,
        pub_date: row.get(5)?,
        link: row.get(6)?,
        category: row.get(7)?,
        is_valid: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RecordStore {
        let store = RecordStore::open_in_memory().unwrap();
        store.ensure_tables().unwrap();
        store
    }

    fn gfg_batch(keys: &[&str]) -> CanonicalBatch {
        let columns = common::model::staging::GfgStagingRecord::COLUMNS;
        CanonicalBatch::new(columns).with_rows(keys.iter().map(|k| {
            StagingRow::new(vec![
                Some(k.to_string()),
                Some(format!("Article {}", k)),
                None,
                None,
                Some(format!("https://www.geeksforgeeks.org/{}/", k)),
                Some("easy".into()),
            ])
        }))
    }

    #[test]
    fn create_table_is_idempotent() {
        let store = RecordStore::open_in_memory().unwrap();
        assert!(store.create_table(Table::DimArticles).unwrap());
        assert!(!store.create_table(Table::DimArticles).unwrap());
    }

    #[test]
    fn staged_rows_come_back_unprocessed_with_ids() {
        let mut store = store();
        let written = store
            .stage(SourcePlatform::Gfg, &gfg_batch(&["a", "b", "c"]), "2024-01-01 00:00:00.000000", 2)
            .unwrap();
        assert_eq!(written, 3);

        let batch = store
            .query(Table::Staging(SourcePlatform::Gfg), RowFilter::Unprocessed)
            .unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.ids(), vec![1, 2, 3]);
        assert_eq!(batch.value(2, "article_id"), Some("c"));
        assert!(!batch.has_column("processed"));
        assert_eq!(
            batch.rows()[0].ingested_at.as_deref(),
            Some("2024-01-01 00:00:00.000000")
        );
    }

    #[test]
    fn update_flag_hides_rows_from_unprocessed_slice() {
        let mut store = store();
        store
            .stage(SourcePlatform::Gfg, &gfg_batch(&["a", "b"]), "2024-01-01 00:00:00.000000", 100)
            .unwrap();
        let table = Table::Staging(SourcePlatform::Gfg);
        assert_eq!(store.update_flag(table, "id", &[1], true).unwrap(), 1);

        let pending = store.query(table, RowFilter::Unprocessed).unwrap();
        assert_eq!(pending.ids(), vec![2]);
        let done = store.query(table, RowFilter::Processed).unwrap();
        assert_eq!(done.ids(), vec![1]);
    }

    const RUN_1: &str = "2024-01-01 00:00:00.000000";
    const RUN_2: &str = "2024-01-02 00:00:00.000000";

    #[test]
    fn pending_rows_are_not_staged_again_by_a_later_ingest() {
        let mut store = store();
        let table = Table::Staging(SourcePlatform::Gfg);
        let first = store
            .stage_new(SourcePlatform::Gfg, &gfg_batch(&["a", "b"]), "article_id", RUN_1, 100)
            .unwrap();
        assert_eq!(first.staged, 2);
        // "a" was promoted, "b" is still pending.
        store.update_flag(table, "id", &[1], true).unwrap();

        let second = store
            .stage_new(SourcePlatform::Gfg, &gfg_batch(&["a", "b"]), "article_id", RUN_2, 100)
            .unwrap();
        assert_eq!(
            second,
            StageReport {
                staged: 1,
                unchanged: 1,
                superseded: 0
            }
        );
        let pending = store.query(table, RowFilter::Unprocessed).unwrap();
        assert_eq!(pending.ids(), vec![2, 3]);
        assert_eq!(pending.value(0, "article_id"), Some("b"));
        assert_eq!(pending.value(1, "article_id"), Some("a"));
    }

    #[test]
    fn rows_from_the_same_ingest_are_all_kept() {
        let mut store = store();
        for _ in 0..2 {
            store
                .stage_new(SourcePlatform::Gfg, &gfg_batch(&["a"]), "article_id", RUN_1, 100)
                .unwrap();
        }
        let pending = store
            .query(Table::Staging(SourcePlatform::Gfg), RowFilter::Unprocessed)
            .unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn changed_row_supersedes_its_pending_predecessor() {
        let mut store = store();
        let table = Table::Staging(SourcePlatform::Gfg);
        store
            .stage_new(SourcePlatform::Gfg, &gfg_batch(&["a", "b"]), "article_id", RUN_1, 100)
            .unwrap();

        let mut changed = CanonicalBatch::new(gfg_batch(&[]).columns().to_vec());
        for row in gfg_batch(&["a"]).rows() {
            let mut values = row.values.clone();
            values[1] = Some("Article a, revised".into());
            changed.push(StagingRow::new(values));
        }
        let report = store
            .stage_new(SourcePlatform::Gfg, &changed, "article_id", RUN_2, 100)
            .unwrap();
        assert_eq!(report.staged, 1);
        assert_eq!(report.superseded, 1);

        let pending = store.query(table, RowFilter::Unprocessed).unwrap();
        assert_eq!(pending.ids(), vec![2, 3]);
        assert_eq!(pending.value(1, "title"), Some("Article a, revised"));
        assert_eq!(store.query(table, RowFilter::Processed).unwrap().ids(), vec![1]);
    }

    #[test]
    fn failing_row_rolls_back_whole_append() {
        let mut store = store();
        let rows = vec![
            vec![
                SqlValue::Text("t".into()),
                SqlValue::Text("stg_gfg_articles".into()),
                SqlValue::Text("article_id".into()),
                SqlValue::Text("a".into()),
                SqlValue::Integer(6),
                SqlValue::Text("bad".into()),
            ],
            vec![
                SqlValue::Text("t".into()),
                SqlValue::Text("stg_gfg_articles".into()),
                SqlValue::Text("article_id".into()),
                SqlValue::Null,
                SqlValue::Integer(6),
                SqlValue::Text("bad".into()),
            ],
        ];
        let err = store
            .append_rows(Table::Quarantine, &QUARANTINE_COLUMNS, &rows, 10)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
        assert_eq!(store.count(Table::Quarantine).unwrap(), 0);
    }

    #[test]
    fn chunk_size_is_clamped_to_parameter_limit() {
        let mut store = store();
        let keys: Vec<String> = (0..50).map(|i| format!("k{}", i)).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let written = store
            .stage(SourcePlatform::Gfg, &gfg_batch(&refs), "2024-01-01 00:00:00.000000", usize::MAX)
            .unwrap();
        assert_eq!(written, 50);
    }

    #[test]
    fn mismatched_row_width_is_rejected() {
        let mut store = store();
        let err = store
            .append_rows(
                Table::Quarantine,
                &QUARANTINE_COLUMNS,
                &[vec![SqlValue::Null]],
                10,
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
