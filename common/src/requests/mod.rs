use serde::Deserialize;

/// Query string accepted by the quarantine listing endpoint.
#[derive(Deserialize)]
pub struct QuarantineQuery {
    /// Restrict to one staging table, e.g. `stg_gfg_articles`.
    pub source_table: Option<String>,
    pub limit: Option<u32>,
}
