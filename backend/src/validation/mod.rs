//! Validation engine.
//!
//! `validate` runs in three steps: a structural check (every declared column
//! is present), the duplicate-key pre-check, then a collect-all pass that
//! evaluates every rule of every field against every row. The first step
//! fails the table, the second rejects the batch wholesale, and only the third
//! produces per-row failures that the quarantine manager can act on.

pub mod rules;
pub mod schema;

use crate::batch::CanonicalBatch;
use crate::error::{PipelineError, Result};
use log::{info, warn};
use rayon::prelude::*;
use schema::{FieldRules, TableSchema};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// One failed check on one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleViolation {
    pub column: String,
    pub rule: String,
    /// Offending value, `None` when it was null.
    pub value: Option<String>,
}

/// Failing row index → violations in schema order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureSet {
    rows: BTreeMap<usize, Vec<RuleViolation>>,
}

impl FailureSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct failing rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn total_violations(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    pub fn failing_rows(&self) -> BTreeSet<usize> {
        self.rows.keys().copied().collect()
    }

    pub fn get(&self, row: usize) -> Option<&[RuleViolation]> {
        self.rows.get(&row).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[RuleViolation])> {
        self.rows.iter().map(|(row, v)| (*row, v.as_slice()))
    }
}

impl FromIterator<(usize, Vec<RuleViolation>)> for FailureSet {
    fn from_iter<I: IntoIterator<Item = (usize, Vec<RuleViolation>)>>(iter: I) -> Self {
        let mut rows: BTreeMap<usize, Vec<RuleViolation>> = BTreeMap::new();
        for (row, violations) in iter {
            rows.entry(row).or_default().extend(violations);
        }
        FailureSet { rows }
    }
}

/// Why a batch was refused before per-row validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRejection {
    pub reason: String,
    pub duplicate_keys: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Clean,
    Failed(FailureSet),
    Rejected(BatchRejection),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Clean)
    }

    pub fn failures(&self) -> Option<&FailureSet> {
        match self {
            ValidationOutcome::Failed(failures) => Some(failures),
            _ => None,
        }
    }
}

/// Rows whose non-blank value in `column` repeats an earlier row.
pub fn count_duplicate_keys(batch: &CanonicalBatch, column: &str) -> usize {
    let mut seen = HashSet::new();
    (0..batch.len())
        .filter_map(|row| batch.value(row, column))
        .filter(|key| !key.trim().is_empty())
        .filter(|key| !seen.insert(*key))
        .count()
}

pub fn validate(batch: &CanonicalBatch, schema: &TableSchema) -> Result<ValidationOutcome> {
    let missing = |column: &str| PipelineError::MissingColumn {
        table: schema.table.clone(),
        column: column.to_string(),
    };
    if !batch.has_column(&schema.natural_key) {
        return Err(missing(&schema.natural_key));
    }
    let mut present: Vec<(&FieldRules, usize)> = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        match batch.column_index(&field.column) {
            Some(idx) => present.push((field, idx)),
            None if field.optional => {}
            None => return Err(missing(&field.column)),
        }
    }

    info!(
        "Data quality check: {} v{} (n={})",
        schema.table,
        schema.version,
        batch.len()
    );

    let duplicate_keys = count_duplicate_keys(batch, &schema.natural_key);
    if duplicate_keys > schema.max_duplicate_keys {
        warn!(
            "  FAIL: excessive duplicate {} ({} > {})",
            schema.natural_key, duplicate_keys, schema.max_duplicate_keys
        );
        return Ok(ValidationOutcome::Rejected(BatchRejection {
            reason: format!(
                "{} duplicate '{}' values exceed the limit of {}",
                duplicate_keys, schema.natural_key, schema.max_duplicate_keys
            ),
            duplicate_keys,
        }));
    }

    let failures: FailureSet = batch
        .rows()
        .par_iter()
        .enumerate()
        .filter_map(|(row_idx, row)| {
            let violations: Vec<RuleViolation> = present
                .iter()
                .flat_map(|(field, col)| {
                    let value = row.values.get(*col).and_then(|v| v.as_deref());
                    field
                        .rules
                        .iter()
                        .filter(move |rule| !rule.passes(value))
                        .map(move |rule| RuleViolation {
                            column: field.column.clone(),
                            rule: rule.name(),
                            value: value.map(str::to_string),
                        })
                })
                .collect();
            (!violations.is_empty()).then_some((row_idx, violations))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    if failures.is_empty() {
        info!("  PASS: {} rows clean", batch.len());
        Ok(ValidationOutcome::Clean)
    } else {
        info!(
            "  {} of {} rows failed ({} violations)",
            failures.len(),
            batch.len(),
            failures.total_violations()
        );
        Ok(ValidationOutcome::Failed(failures))
    }
}
