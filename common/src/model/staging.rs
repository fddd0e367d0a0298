//! Canonical staging shapes, one per source platform.
//!
//! Every staging table additionally carries the store-managed columns `id`,
//! `ingested_at` and `processed`; those never appear in these structs because
//! normalizers produce rows before the store has seen them.

/// A GeeksforGeeks article projected from a CSV export row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GfgStagingRecord {
    /// Natural key, the slug taken from the article link.
    pub article_id: Option<String>,
    pub title: Option<String>,
    pub author_id: Option<String>,
    /// `YYYY-MM-DD HH:MM:SS`, or `None` when the export date could not be parsed.
    pub last_updated: Option<String>,
    pub link: Option<String>,
    pub category: Option<String>,
}

impl GfgStagingRecord {
    pub const COLUMNS: [&'static str; 6] = [
        "article_id",
        "title",
        "author_id",
        "last_updated",
        "link",
        "category",
    ];
    pub const NATURAL_KEY: &'static str = "article_id";

    /// Values in `COLUMNS` order.
    pub fn into_values(self) -> Vec<Option<String>> {
        vec![
            self.article_id,
            self.title,
            self.author_id,
            self.last_updated,
            self.link,
            self.category,
        ]
    }
}

/// A Medium feed entry with its nested sub-objects flattened to JSON strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediumStagingRecord {
    pub title: String,
    pub title_detail: String,
    pub summary: String,
    pub summary_detail: String,
    pub link: String,
    /// Natural key, the entry `id` emitted by the feed.
    pub id_rss: String,
    pub published: String,
    pub published_parsed: String,
    pub updated: String,
    pub tags: String,
    pub authors: String,
}

impl MediumStagingRecord {
    pub const COLUMNS: [&'static str; 11] = [
        "title",
        "title_detail",
        "summary",
        "summary_detail",
        "link",
        "id_rss",
        "published",
        "published_parsed",
        "updated",
        "tags",
        "authors",
    ];
    pub const NATURAL_KEY: &'static str = "id_rss";

    /// Values in `COLUMNS` order.
    pub fn into_values(self) -> Vec<Option<String>> {
        vec![
            Some(self.title),
            Some(self.title_detail),
            Some(self.summary),
            Some(self.summary_detail),
            Some(self.link),
            Some(self.id_rss),
            Some(self.published),
            Some(self.published_parsed),
            Some(self.updated),
            Some(self.tags),
            Some(self.authors),
        ]
    }
}
