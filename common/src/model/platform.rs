use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of article sources known to the pipeline.
///
/// The serialized form doubles as the `source_platform` value stored in
/// `dim_articles`, which carries a CHECK constraint over exactly these labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourcePlatform {
    /// GeeksforGeeks CSV exports.
    #[serde(rename = "GFG")]
    Gfg,
    /// Medium RSS/Atom feeds.
    #[serde(rename = "Medium")]
    Medium,
}

impl SourcePlatform {
    pub const ALL: [SourcePlatform; 2] = [SourcePlatform::Gfg, SourcePlatform::Medium];

    /// Label stored in `dim_articles.source_platform`.
    pub fn label(&self) -> &'static str {
        match self {
            SourcePlatform::Gfg => "GFG",
            SourcePlatform::Medium => "Medium",
        }
    }

    /// Name of the staging table this platform lands in.
    pub fn staging_table(&self) -> &'static str {
        match self {
            SourcePlatform::Gfg => "stg_gfg_articles",
            SourcePlatform::Medium => "stg_medium_articles",
        }
    }
}

impl fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SourcePlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GFG" => Ok(SourcePlatform::Gfg),
            "Medium" => Ok(SourcePlatform::Medium),
            other => Err(format!("unknown source platform '{}'", other)),
        }
    }
}
