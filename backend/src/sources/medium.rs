use crate::batch::{CanonicalBatch, StagingRow};
use crate::error::Result;
use crate::sources::{keep_last_by_key, optional_value, required_value, RawRecord, SourceAdapter};
use common::model::dimension::DimArticle;
use common::model::platform::SourcePlatform;
use common::model::staging::MediumStagingRecord;
use log::debug;
use serde_json::Value;

#[derive(Debug, Default, Clone, Copy)]
pub struct MediumAdapter;

impl SourceAdapter for MediumAdapter {
    fn platform(&self) -> SourcePlatform {
        SourcePlatform::Medium
    }

    fn natural_key_column(&self) -> &'static str {
        MediumStagingRecord::NATURAL_KEY
    }

    fn staging_columns(&self) -> &'static [&'static str] {
        &MediumStagingRecord::COLUMNS
    }

    fn normalize(&self, raw: &[RawRecord]) -> CanonicalBatch {
        let records: Vec<MediumStagingRecord> = raw.iter().map(record_from_entry).collect();
        let before = records.len();
        // Entries without an id are kept so validation can quarantine them.
        let records = keep_last_by_key(records, |r| {
            (!r.id_rss.trim().is_empty()).then(|| (r.link.clone(), r.id_rss.clone()))
        });
        if records.len() < before {
            debug!(
                "Dropped {} Medium entries with a repeated (link, id)",
                before - records.len()
            );
        }
        CanonicalBatch::new(MediumStagingRecord::COLUMNS)
            .with_rows(records.into_iter().map(|r| StagingRow::new(r.into_values())))
    }

    fn map_to_dimension(&self, batch: &CanonicalBatch, row: usize) -> Result<DimArticle> {
        let table = self.staging_table();
        Ok(DimArticle {
            id: None,
            article_id: required_value(batch, table, row, "id_rss")?,
            source_platform: SourcePlatform::Medium,
            title: required_value(batch, table, row, "title")?,
            author: batch.value(row, "authors").and_then(first_author),
            pub_date: optional_value(batch, row, "published"),
            link: optional_value(batch, row, "link"),
            category: batch.value(row, "tags").and_then(first_tag),
            is_valid: true,
            created_at: None,
            updated_at: None,
        })
    }
}

fn record_from_entry(entry: &RawRecord) -> MediumStagingRecord {
    MediumStagingRecord {
        title: scalar(entry, "title"),
        title_detail: nested(entry, "title_detail"),
        summary: scalar(entry, "summary"),
        summary_detail: nested(entry, "summary_detail"),
        link: scalar(entry, "link"),
        id_rss: scalar(entry, "id"),
        published: scalar(entry, "published"),
        published_parsed: scalar(entry, "published_parsed"),
        updated: scalar(entry, "updated"),
        tags: nested(entry, "tags"),
        authors: nested(entry, "authors"),
    }
}

/// Missing scalars become empty strings; structured values are kept as JSON text.
fn scalar(entry: &RawRecord, field: &str) -> String {
    match entry.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Nested sub-objects are stored as JSON text, `{}` when absent.
fn nested(entry: &RawRecord, field: &str) -> String {
    match entry.get(field) {
        Some(v @ (Value::Object(_) | Value::Array(_))) => v.to_string(),
        _ => "{}".to_string(),
    }
}

fn first_of(list: &str, key: &str) -> Option<String> {
    match serde_json::from_str::<Value>(list).ok()? {
        Value::Array(items) => match items.into_iter().next()? {
            Value::Object(mut map) => match map.remove(key)? {
                Value::String(s) if !s.is_empty() => Some(s),
                _ => None,
            },
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        },
        _ => None,
    }
}

/// Name of the first entry in a serialized `authors` list.
pub fn first_author(authors: &str) -> Option<String> {
    first_of(authors, "name")
}

/// Term of the first entry in a serialized `tags` list.
pub fn first_tag(tags: &str) -> Option<String> {
    first_of(tags, "term")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, title: &str) -> RawRecord {
        match json!({
            "title": title,
            "title_detail": {"type": "text/plain", "value": title},
            "link": format!("https://medium.com/@jdoe/{}", id),
            "id": format!("https://medium.com/p/{}", id),
            "published": "Tue, 10 Jun 2025 14:12:01 GMT",
            "published_parsed": [2025, 6, 10, 14, 12, 1, 1, 161, 0],
            "tags": [{"term": "rust", "scheme": null}, {"term": "databases"}],
            "authors": [{"name": "Jane Doe"}]
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn nested_fields_are_flattened_to_json() {
        let batch = MediumAdapter.normalize(&[entry("abc", "Ownership in practice")]);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.value(0, "id_rss"), Some("https://medium.com/p/abc"));
        assert_eq!(batch.value(0, "summary_detail"), Some("{}"));
        assert_eq!(batch.value(0, "summary"), Some(""));
        assert_eq!(
            batch.value(0, "published_parsed"),
            Some("[2025,6,10,14,12,1,1,161,0]")
        );
        let tags: Value = serde_json::from_str(batch.value(0, "tags").unwrap()).unwrap();
        assert_eq!(tags[0]["term"], "rust");
    }

    #[test]
    fn repeated_entries_keep_the_last() {
        let batch = MediumAdapter.normalize(&[
            entry("abc", "First title"),
            entry("xyz", "Other post"),
            entry("abc", "Edited title"),
        ]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.value(1, "title"), Some("Edited title"));
    }

    #[test]
    fn entries_without_an_id_are_all_kept() {
        let mut entries = Vec::new();
        for title in ["Untracked one", "Untracked two"] {
            let mut e = entry("abc", title);
            e.remove("id");
            e.remove("link");
            entries.push(e);
        }
        let batch = MediumAdapter.normalize(&entries);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.value(0, "id_rss"), Some(""));
        assert_eq!(batch.value(1, "title"), Some("Untracked two"));
    }

    #[test]
    fn first_author_and_tag_accept_objects_or_strings() {
        assert_eq!(first_author(r#"[{"name": "Jane"}, {"name": "Bob"}]"#).as_deref(), Some("Jane"));
        assert_eq!(first_author(r#"["Jane"]"#).as_deref(), Some("Jane"));
        assert_eq!(first_author("{}"), None);
        assert_eq!(first_author("[]"), None);
        assert_eq!(first_tag(r#"[{"term": "rust"}]"#).as_deref(), Some("rust"));
        assert_eq!(first_tag("not json"), None);
    }

    #[test]
    fn maps_entry_to_dimension() {
        let batch = MediumAdapter.normalize(&[entry("abc", "Ownership in practice")]);
        let article = MediumAdapter.map_to_dimension(&batch, 0).unwrap();
        assert_eq!(article.article_id, "https://medium.com/p/abc");
        assert_eq!(article.source_platform, SourcePlatform::Medium);
        assert_eq!(article.author.as_deref(), Some("Jane Doe"));
        assert_eq!(article.category.as_deref(), Some("rust"));
        assert_eq!(
            article.pub_date.as_deref(),
            Some("Tue, 10 Jun 2025 14:12:01 GMT")
        );
    }

    #[test]
    fn entry_without_id_cannot_be_mapped() {
        let mut e = entry("abc", "Ownership in practice");
        e.remove("id");
        let batch = MediumAdapter.normalize(&[e]);
        assert!(MediumAdapter.map_to_dimension(&batch, 0).is_err());
    }
}
