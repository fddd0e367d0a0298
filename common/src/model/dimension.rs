use crate::model::platform::SourcePlatform;
use serde::{Deserialize, Serialize};

/// A conformed article, one row per `article_id` across all sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimArticle {
    pub id: Option<i64>,
    pub article_id: String,
    pub source_platform: SourcePlatform,
    pub title: String,
    pub author: Option<String>,
    pub pub_date: Option<String>,
    pub link: Option<String>,
    pub category: Option<String>,
    pub is_valid: bool,
    /// Set on first insert and never touched by later upserts.
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Summary of `dim_articles` used for pipeline monitoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionStats {
    pub total: i64,
    /// Row count keyed by platform label.
    pub per_platform: Vec<(String, i64)>,
    pub earliest_pub: Option<String>,
    pub latest_pub: Option<String>,
}
