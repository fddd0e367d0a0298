//! Monitoring endpoints over `dim_articles`, mounted at `/api/dimensions`.

mod stats;

use actix_web::web::{get, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/dimensions";

/// *   **`GET /stats`**: row totals per platform plus the publication date range.
pub fn configure_routes() -> Scope {
    scope(API_PATH).route("/stats", get().to(stats::process))
}
