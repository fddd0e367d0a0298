use crate::batch::{CanonicalBatch, StagingRow};
use crate::error::Result;
use crate::sources::{keep_last_by_key, optional_value, required_value, RawRecord, SourceAdapter};
use chrono::{NaiveDate, NaiveDateTime};
use common::model::dimension::DimArticle;
use common::model::platform::SourcePlatform;
use common::model::staging::GfgStagingRecord;
use log::debug;
use serde_json::Value;

/// Date layout used by GeeksforGeeks exports, e.g. `12 Mar, 2023`.
const EXPORT_DATE_FORMAT: &str = "%d %b, %Y";
const STAGING_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Default, Clone, Copy)]
pub struct GfgAdapter;

impl SourceAdapter for GfgAdapter {
    fn platform(&self) -> SourcePlatform {
        SourcePlatform::Gfg
    }

    fn natural_key_column(&self) -> &'static str {
        GfgStagingRecord::NATURAL_KEY
    }

    fn staging_columns(&self) -> &'static [&'static str] {
        &GfgStagingRecord::COLUMNS
    }

    fn normalize(&self, raw: &[RawRecord]) -> CanonicalBatch {
        let records: Vec<GfgStagingRecord> = raw.iter().map(record_from_raw).collect();
        let before = records.len();
        let records = keep_last_by_key(records, |r| r.article_id.clone());
        if records.len() < before {
            debug!(
                "Dropped {} GFG rows with a repeated article_id",
                before - records.len()
            );
        }
        CanonicalBatch::new(GfgStagingRecord::COLUMNS)
            .with_rows(records.into_iter().map(|r| StagingRow::new(r.into_values())))
    }

    fn map_to_dimension(&self, batch: &CanonicalBatch, row: usize) -> Result<DimArticle> {
        let table = self.staging_table();
        Ok(DimArticle {
            id: None,
            article_id: required_value(batch, table, row, "article_id")?,
            source_platform: SourcePlatform::Gfg,
            title: required_value(batch, table, row, "title")?,
            author: optional_value(batch, row, "author_id"),
            pub_date: batch.value(row, "last_updated").and_then(date_part),
            link: optional_value(batch, row, "link"),
            category: optional_value(batch, row, "category"),
            is_valid: true,
            created_at: None,
            updated_at: None,
        })
    }
}

fn record_from_raw(raw: &RawRecord) -> GfgStagingRecord {
    let link = text(raw, "link");
    GfgStagingRecord {
        article_id: link.as_deref().and_then(article_id_from_link),
        title: text(raw, "title"),
        author_id: text(raw, "author_id"),
        last_updated: text(raw, "last_updated")
            .as_deref()
            .and_then(parse_export_date),
        link,
        category: text(raw, "category"),
    }
}

/// Scalar cell as text; empty cells and nested values count as missing.
fn text(raw: &RawRecord, field: &str) -> Option<String> {
    match raw.get(field)? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// The final path segment of an article link:
/// `https://www.geeksforgeeks.org/binary-search/` → `binary-search`.
///
/// Links without a path yield `None` rather than the host name.
pub fn article_id_from_link(link: &str) -> Option<String> {
    let link = link.split(['?', '#']).next().unwrap_or(link);
    let after_scheme = link.split_once("://").map_or(link, |(_, rest)| rest);
    let mut segments = after_scheme
        .trim_end_matches('/')
        .split('/')
        .filter(|s| !s.is_empty());
    let _host = segments.next()?;
    segments.last().map(str::to_string)
}

/// `12 Mar, 2023` → `2023-03-12 00:00:00`. Values already in staging layout
/// pass through, anything else becomes `None`.
pub fn parse_export_date(value: &str) -> Option<String> {
    let value = value.trim();
    if NaiveDateTime::parse_from_str(value, STAGING_TIMESTAMP_FORMAT).is_ok() {
        return Some(value.to_string());
    }
    NaiveDate::parse_from_str(value, EXPORT_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.format(STAGING_TIMESTAMP_FORMAT).to_string())
}

fn date_part(value: &str) -> Option<String> {
    NaiveDateTime::parse_from_str(value.trim(), STAGING_TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.date().format("%Y-%m-%d").to_string())
}
