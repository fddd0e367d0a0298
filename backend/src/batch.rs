//! Column-oriented batch of staging rows shared by every pipeline stage.

use std::collections::{BTreeSet, HashMap};

/// One staging row. `id` is the store-assigned surrogate key and stays `None`
/// until the row has been read back from a staging table.
#[derive(Debug, Clone, PartialEq)]
pub struct StagingRow {
    pub id: Option<i64>,
    pub ingested_at: Option<String>,
    pub values: Vec<Option<String>>,
}

impl StagingRow {
    pub fn new(values: Vec<Option<String>>) -> Self {
        StagingRow {
            id: None,
            ingested_at: None,
            values,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalBatch {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<StagingRow>,
}

impl CanonicalBatch {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        CanonicalBatch {
            columns,
            index,
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding or truncating its values to the batch width.
    pub fn push(&mut self, mut row: StagingRow) {
        row.values.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = StagingRow>) -> Self {
        for row in rows {
            self.push(row);
        }
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[StagingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// Value of `column` in row `row`; `None` for nulls, unknown columns and
    /// out-of-range rows alike.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.values.get(col)?.as_deref()
    }

    /// Surrogate ids of every row that has one, in row order.
    pub fn ids(&self) -> Vec<i64> {
        self.rows.iter().filter_map(|r| r.id).collect()
    }

    /// Drops the rows at `indices`; the remaining rows are densely re-indexed.
    pub fn without_rows(self, indices: &BTreeSet<usize>) -> CanonicalBatch {
        let CanonicalBatch {
            columns,
            index,
            rows,
        } = self;
        let rows = rows
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !indices.contains(i))
            .map(|(_, r)| r)
            .collect();
        CanonicalBatch {
            columns,
            index,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CanonicalBatch {
        CanonicalBatch::new(["article_id", "title"]).with_rows([
            StagingRow::new(vec![Some("a".into()), Some("First".into())]).with_id(1),
            StagingRow::new(vec![Some("b".into()), None]).with_id(2),
            StagingRow::new(vec![Some("c".into()), Some("Third".into())]).with_id(3),
        ])
    }

    #[test]
    fn value_lookup_handles_nulls_and_unknown_columns() {
        let batch = sample();
        assert_eq!(batch.value(0, "title"), Some("First"));
        assert_eq!(batch.value(1, "title"), None);
        assert_eq!(batch.value(0, "link"), None);
        assert_eq!(batch.value(9, "title"), None);
    }

    #[test]
    fn without_rows_reindexes_densely() {
        let batch = sample().without_rows(&BTreeSet::from([1]));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.value(1, "article_id"), Some("c"));
        assert_eq!(batch.ids(), vec![1, 3]);
    }

    #[test]
    fn push_pads_short_rows() {
        let mut batch = CanonicalBatch::new(["a", "b", "c"]);
        batch.push(StagingRow::new(vec![Some("x".into())]));
        assert_eq!(batch.rows()[0].values.len(), 3);
        assert_eq!(batch.value(0, "c"), None);
    }
}
