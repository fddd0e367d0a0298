//! Source fetch boundary.
//!
//! Fetchers never fail past this module: any I/O, CSV or JSON problem is
//! logged and the source contributes an empty batch to the run.

use crate::sources::{RawRecord, SourceDescriptor};
use common::model::platform::SourcePlatform;
use log::{info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected feed layout: {0}")]
    Format(String),
}

pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, source: &SourceDescriptor) -> Vec<RawRecord>;
}

/// Reads CSV exports and JSON dumps of parsed feed entries from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

impl SourceFetcher for FileFetcher {
    fn fetch(&self, source: &SourceDescriptor) -> Vec<RawRecord> {
        let result = match source.platform {
            SourcePlatform::Gfg => File::open(&source.location)
                .map_err(FetchError::from)
                .and_then(|f| parse_csv(BufReader::new(f))),
            SourcePlatform::Medium => read_feed_dump(&source.location),
        };
        match result {
            Ok(records) => {
                info!(
                    "Fetched {} raw records from '{}' ({})",
                    records.len(),
                    source.name,
                    source.location.display()
                );
                records
            }
            Err(e) => {
                warn!(
                    "Error fetching '{}' from {}: {}",
                    source.name,
                    source.location.display(),
                    e
                );
                Vec::new()
            }
        }
    }
}

/// Parses CSV text into header-keyed records.
///
/// Empty cells become nulls. A record that cannot be decoded is skipped with a
/// warning; only an unreadable header fails the whole input.
pub fn parse_csv<R: Read>(input: R) -> Result<Vec<RawRecord>, FetchError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping CSV record {}: {}", line + 2, e);
                continue;
            }
        };
        let raw: RawRecord = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let value = match record.get(i) {
                    Some(cell) if !cell.is_empty() => Value::String(cell.to_string()),
                    _ => Value::Null,
                };
                (h.clone(), value)
            })
            .collect();
        records.push(raw);
    }
    Ok(records)
}

/// Accepts either a bare array of entries or an object with an `entries`
/// array, the shape feed parsers usually dump.
pub fn read_feed_dump(path: &Path) -> Result<Vec<RawRecord>, FetchError> {
    let value: Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    feed_entries(value)
}

pub fn feed_entries(value: Value) -> Result<Vec<RawRecord>, FetchError> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("entries") {
            Some(Value::Array(entries)) => entries,
            _ => return Err(FetchError::Format("missing 'entries' array".to_string())),
        },
        other => {
            return Err(FetchError::Format(format!(
                "expected array or object, found {}",
                other
            )))
        }
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Object(map) => Some(map),
            other => {
                warn!("Skipping non-object feed entry: {}", other);
                None
            }
        })
        .collect())
}

/// Serves pre-loaded records by source name. Unknown sources yield nothing.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFetcher {
    records: HashMap<String, Vec<RawRecord>>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_name: &str, records: Vec<RawRecord>) {
        self.records.insert(source_name.to_string(), records);
    }
}

impl SourceFetcher for InMemoryFetcher {
    fn fetch(&self, source: &SourceDescriptor) -> Vec<RawRecord> {
        match self.records.get(&source.name) {
            Some(records) => records.clone(),
            None => {
                warn!("No records registered for source '{}'", source.name);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_cells_are_keyed_by_header() {
        let data = "title,author_id,last_updated,link,category\n\
                    Binary Search,jdoe,\"12 Mar, 2023\",https://www.geeksforgeeks.org/binary-search/,easy\n\
                    Quick Sort,,,https://www.geeksforgeeks.org/quick-sort/,medium\n";
        let records = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["last_updated"], Value::String("12 Mar, 2023".into()));
        assert_eq!(records[1]["author_id"], Value::Null);
    }

    #[test]
    fn short_csv_rows_are_padded_with_nulls() {
        let records = parse_csv("a,b,c\n1\n".as_bytes()).unwrap();
        assert_eq!(records[0]["a"], Value::String("1".into()));
        assert_eq!(records[0]["c"], Value::Null);
    }

    #[test]
    fn feed_dump_accepts_both_layouts() {
        let bare = serde_json::json!([{"id": "1"}, "junk", {"id": "2"}]);
        assert_eq!(feed_entries(bare).unwrap().len(), 2);
        let wrapped = serde_json::json!({"feed": {}, "entries": [{"id": "1"}]});
        assert_eq!(feed_entries(wrapped).unwrap().len(), 1);
        assert!(feed_entries(serde_json::json!({"bozo": 1})).is_err());
    }

    #[test]
    fn unreadable_source_degrades_to_empty() {
        let source = SourceDescriptor {
            name: "missing".to_string(),
            platform: SourcePlatform::Medium,
            location: "/definitely/not/here.json".into(),
        };
        assert!(FileFetcher.fetch(&source).is_empty());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<rss>not json</rss>").unwrap();
        let source = SourceDescriptor {
            location: file.path().to_path_buf(),
            ..source
        };
        assert!(FileFetcher.fetch(&source).is_empty());
    }
}
