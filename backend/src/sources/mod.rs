//! Per-platform normalizers.
//!
//! An adapter turns raw fetched records into rows shaped like its staging
//! table, and turns validated staging rows into `dim_articles` rows.

pub mod fetch;
pub mod gfg;
pub mod medium;

use crate::batch::CanonicalBatch;
use crate::error::{PipelineError, Result};
use crate::store::tables::Table;
use common::model::dimension::DimArticle;
use common::model::platform::SourcePlatform;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::hash::Hash;
use std::path::PathBuf;

pub use gfg::GfgAdapter;
pub use medium::MediumAdapter;

/// One fetched record, keyed by the source's own field names.
pub type RawRecord = Map<String, Value>;

/// Where a source lives and which adapter reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub platform: SourcePlatform,
    pub location: PathBuf,
}

pub trait SourceAdapter: Send + Sync {
    fn platform(&self) -> SourcePlatform;

    fn natural_key_column(&self) -> &'static str;

    fn staging_columns(&self) -> &'static [&'static str];

    /// Shape raw records into staging rows, dropping duplicates of the
    /// natural key (the last occurrence wins).
    fn normalize(&self, raw: &[RawRecord]) -> CanonicalBatch;

    fn map_to_dimension(&self, batch: &CanonicalBatch, row: usize) -> Result<DimArticle>;

    fn staging_table(&self) -> Table {
        Table::Staging(self.platform())
    }
}

pub fn adapter_for(platform: SourcePlatform) -> &'static dyn SourceAdapter {
    match platform {
        SourcePlatform::Gfg => &GfgAdapter,
        SourcePlatform::Medium => &MediumAdapter,
    }
}

/// Keeps the last item for every key, preserving the order of survivors.
/// Items without a key are always kept.
pub(crate) fn keep_last_by_key<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> Option<K>,
{
    let mut seen = HashSet::new();
    let mut kept: Vec<T> = items
        .into_iter()
        .rev()
        .filter(|item| match key(item) {
            Some(k) => seen.insert(k),
            None => true,
        })
        .collect();
    kept.reverse();
    kept
}

/// Non-null value of `column` on `row`, or a mapping error naming the row.
pub(crate) fn required_value(
    batch: &CanonicalBatch,
    table: Table,
    row: usize,
    column: &str,
) -> Result<String> {
    batch
        .value(row, column)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| PipelineError::Mapping {
            table: table.name().to_string(),
            row,
            reason: format!("'{}' is missing", column),
        })
}

pub(crate) fn optional_value(batch: &CanonicalBatch, row: usize, column: &str) -> Option<String> {
    batch
        .value(row, column)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_occurrence_wins() {
        let items = vec![("a", 1), ("b", 2), ("a", 3), ("c", 4)];
        let kept = keep_last_by_key(items, |(k, _)| Some(*k));
        assert_eq!(kept, vec![("b", 2), ("a", 3), ("c", 4)]);
    }

    #[test]
    fn keyless_items_survive() {
        let items = vec![None, Some(1), None, Some(1)];
        let kept = keep_last_by_key(items, |v| *v);
        assert_eq!(kept, vec![None, None, Some(1)]);
    }

    #[test]
    fn adapters_match_their_platform() {
        for platform in SourcePlatform::ALL {
            let adapter = adapter_for(platform);
            assert_eq!(adapter.platform(), platform);
            assert_eq!(adapter.staging_table().name(), platform.staging_table());
            assert!(adapter
                .staging_columns()
                .contains(&adapter.natural_key_column()));
        }
    }
}
