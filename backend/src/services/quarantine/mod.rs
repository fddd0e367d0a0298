//! Read access to the `dq_quarantine` audit trail under `/api/quarantine`.

mod list;

use actix_web::web::{get, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/quarantine";

/// *   **`GET /?source_table=...&limit=...`**: quarantine records, newest first.
pub fn configure_routes() -> Scope {
    scope(API_PATH).route("", get().to(list::process))
}
