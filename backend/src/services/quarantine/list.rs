use crate::config::AppConfig;
use crate::error::Result;
use crate::store::{RecordStore, Table};
use actix_web::{web, HttpResponse, Responder};
use common::model::quarantine::QuarantineRecord;
use common::requests::QuarantineQuery;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 10_000;

/// - `200 OK` with a JSON array of `QuarantineRecord`.
/// - `400 Bad Request` when `source_table` is not a staging table.
/// - `503 Service Unavailable` when the database cannot be read.
pub(crate) async fn process(
    query: web::Query<QuarantineQuery>,
    config: web::Data<AppConfig>,
) -> impl Responder {
    let query = query.into_inner();
    if let Some(table) = query.source_table.as_deref() {
        if !matches!(Table::from_name(table), Some(Table::Staging(_))) {
            return HttpResponse::BadRequest().body(format!("Unknown staging table '{}'", table));
        }
    }
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
    match list_quarantine(&config, query.source_table.as_deref(), limit) {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(e) => HttpResponse::ServiceUnavailable()
            .body(format!("Error reading quarantine: {}", e)),
    }
}

fn list_quarantine(
    config: &AppConfig,
    source_table: Option<&str>,
    limit: usize,
) -> Result<Vec<QuarantineRecord>> {
    let store = RecordStore::open(&config.database_path)?;
    store.create_table(Table::Quarantine)?;
    store.quarantine_records(source_table, limit)
}
