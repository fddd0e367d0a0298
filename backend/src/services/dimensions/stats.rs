use crate::config::AppConfig;
use crate::error::Result;
use crate::store::{RecordStore, Table};
use actix_web::{web, HttpResponse, Responder};
use common::model::dimension::DimensionStats;

pub(crate) async fn process(config: web::Data<AppConfig>) -> impl Responder {
    match dimension_stats(&config) {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => HttpResponse::ServiceUnavailable()
            .body(format!("Error reading dimension stats: {}", e)),
    }
}

fn dimension_stats(config: &AppConfig) -> Result<DimensionStats> {
    let store = RecordStore::open(&config.database_path)?;
    store.create_table(Table::DimArticles)?;
    store.dimension_stats()
}
