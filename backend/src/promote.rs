//! Dimension promoter: upserts clean staging rows into `dim_articles` and
//! flags them processed in the same transaction.

use crate::batch::CanonicalBatch;
use crate::error::{PipelineError, Result};
use crate::sources::SourceAdapter;
use crate::store::RecordStore;
use common::model::dimension::DimArticle;
use log::info;

/// Promotes every row of `clean`. Rows are all mapped before anything is
/// written, so a mapping error leaves the store untouched.
pub fn promote(
    store: &mut RecordStore,
    adapter: &dyn SourceAdapter,
    clean: &CanonicalBatch,
    promoted_at: &str,
) -> Result<usize> {
    if clean.is_empty() {
        return Ok(0);
    }
    let table = adapter.staging_table();

    let articles = (0..clean.len())
        .map(|row| adapter.map_to_dimension(clean, row))
        .collect::<Result<Vec<DimArticle>>>()?;

    let ids = clean.ids();
    if ids.len() != clean.len() {
        return Err(PipelineError::Mapping {
            table: table.name().to_string(),
            row: clean.rows().iter().position(|r| r.id.is_none()).unwrap_or(0),
            reason: "row has no staging id".to_string(),
        });
    }

    let promoted = store.promote_articles(table, &articles, &ids, promoted_at)?;
    info!(
        "Promoted {} rows from '{}' to dim_articles",
        promoted,
        table.name()
    );
    Ok(promoted)
}
