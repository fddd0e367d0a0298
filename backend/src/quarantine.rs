//! Quarantine manager: persists one audit row per failing staging row and
//! hands the remaining rows on for promotion.

use crate::batch::CanonicalBatch;
use crate::error::Result;
use crate::store::{RecordStore, Table};
use crate::validation::{FailureSet, RuleViolation};
use common::model::quarantine::QuarantineRecord;
use log::info;
use std::collections::BTreeSet;

/// Upper bound, in characters, of a stored validation message.
pub const DEFAULT_MAX_ERROR_LEN: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct QuarantineContext<'a> {
    pub table: Table,
    pub pk_column: &'a str,
    pub run_timestamp: &'a str,
    pub max_error_len: usize,
    pub chunk_size: usize,
}

#[derive(Debug)]
pub struct Partition {
    pub clean: CanonicalBatch,
    pub quarantined: usize,
}

/// Splits `batch` into clean rows and quarantined rows.
///
/// The quarantine append is all-or-nothing; on error nothing was written and
/// the caller must not promote anything from this batch.
pub fn partition(
    store: &mut RecordStore,
    batch: CanonicalBatch,
    failures: &FailureSet,
    ctx: &QuarantineContext<'_>,
) -> Result<Partition> {
    if failures.is_empty() {
        return Ok(Partition {
            clean: batch,
            quarantined: 0,
        });
    }

    let mut failing = BTreeSet::new();
    let records: Vec<QuarantineRecord> = failures
        .iter()
        .filter(|(row, _)| *row < batch.len())
        .map(|(row, violations)| {
            failing.insert(row);
            QuarantineRecord {
                id: None,
                run_timestamp: ctx.run_timestamp.to_string(),
                source_table: ctx.table.name().to_string(),
                pk_column_name: ctx.pk_column.to_string(),
                pk_value: batch
                    .value(row, ctx.pk_column)
                    .unwrap_or("NULL")
                    .to_string(),
                total_columns: batch.columns().len() as i64,
                validation_error: truncate_chars(&describe(violations), ctx.max_error_len),
            }
        })
        .collect();

    store.append_quarantine(&records, ctx.chunk_size)?;
    info!(
        "Quarantined {} rows from '{}'",
        records.len(),
        ctx.table.name()
    );

    Ok(Partition {
        clean: batch.without_rows(&failing),
        quarantined: records.len(),
    })
}

/// `title: str_length(6, 199) failed for 'ab'; link: required failed for null`
pub fn describe(violations: &[RuleViolation]) -> String {
    violations
        .iter()
        .map(|v| match &v.value {
            Some(value) => format!("{}: {} failed for '{}'", v.column, v.rule, value),
            None => format!("{}: {} failed for null", v.column, v.rule),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::StagingRow;
    use common::model::platform::SourcePlatform;

    const TABLE: Table = Table::Staging(SourcePlatform::Gfg);

    fn ctx(max_error_len: usize) -> QuarantineContext<'static> {
        QuarantineContext {
            table: TABLE,
            pk_column: "article_id",
            run_timestamp: "2025-06-10 14:00:00.000000",
            max_error_len,
            chunk_size: 2,
        }
    }

    fn violation(column: &str, rule: &str, value: Option<&str>) -> RuleViolation {
        RuleViolation {
            column: column.to_string(),
            rule: rule.to_string(),
            value: value.map(str::to_string),
        }
    }

    fn batch() -> CanonicalBatch {
        CanonicalBatch::new(["article_id", "title"]).with_rows([
            StagingRow::new(vec![Some("a".into()), Some("Binary search".into())]).with_id(1),
            StagingRow::new(vec![Some("b".into()), Some("ab".into())]).with_id(2),
            StagingRow::new(vec![None, Some("Merge sort".into())]).with_id(3),
            StagingRow::new(vec![Some("d".into()), Some("Heap sort".into())]).with_id(4),
        ])
    }

    fn store() -> RecordStore {
        let store = RecordStore::open_in_memory().unwrap();
        store.ensure_tables().unwrap();
        store
    }

    #[test]
    fn clean_batch_passes_through_untouched() {
        let mut store = store();
        let p = partition(&mut store, batch(), &FailureSet::default(), &ctx(1000)).unwrap();
        assert_eq!(p.quarantined, 0);
        assert_eq!(p.clean.len(), 4);
        assert_eq!(store.count(Table::Quarantine).unwrap(), 0);
    }

    #[test]
    fn failing_rows_are_recorded_once_and_removed() {
        let mut store = store();
        let failures: FailureSet = vec![
            (1, vec![violation("title", "str_length(6, 199)", Some("ab"))]),
            (2, vec![violation("article_id", "required", None)]),
            (1, vec![violation("title", "custom:non_empty", Some("ab"))]),
        ]
        .into_iter()
        .collect();

        let p = partition(&mut store, batch(), &failures, &ctx(1000)).unwrap();
        assert_eq!(p.quarantined, 2);
        assert_eq!(p.clean.len() + p.quarantined, 4);
        assert_eq!(p.clean.ids(), vec![1, 4]);
        assert_eq!(p.clean.value(1, "article_id"), Some("d"));

        let records = store.quarantine_records(Some(TABLE.name()), 10).unwrap();
        assert_eq!(records.len(), 2);
        let b = records.iter().find(|r| r.pk_value == "b").unwrap();
        assert_eq!(
            b.validation_error,
            "title: str_length(6, 199) failed for 'ab'; title: custom:non_empty failed for 'ab'"
        );
        assert_eq!(b.total_columns, 2);
        assert!(records.iter().any(|r| r.pk_value == "NULL"));
    }

    #[test]
    fn messages_are_truncated_on_char_boundaries() {
        assert_eq!(truncate_chars("äöüß", 2), "äö");
        assert_eq!(truncate_chars("abc", 10), "abc");

        let mut store = store();
        let failures: FailureSet =
            vec![(0, vec![violation("title", "str_length(6, 199)", Some("ééééé"))])]
                .into_iter()
                .collect();
        partition(&mut store, batch(), &failures, &ctx(10)).unwrap();
        let record = &store.quarantine_records(None, 1).unwrap()[0];
        assert_eq!(record.validation_error.chars().count(), 10);
    }

    #[test]
    fn quarantine_failure_writes_nothing() {
        let mut store = RecordStore::open_in_memory().unwrap();
        store.create_table(TABLE).unwrap();
        let failures: FailureSet = vec![(1, vec![violation("title", "required", None)])]
            .into_iter()
            .collect();
        assert!(partition(&mut store, batch(), &failures, &ctx(1000)).is_err());
        store.create_table(Table::Quarantine).unwrap();
        assert_eq!(store.count(Table::Quarantine).unwrap(), 0);
    }
}
