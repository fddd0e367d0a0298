//! CSV exports as a data source.
//!
//! - `POST /api/data_sources/csv/upload`: multipart upload with a `file` field
//!   holding a GeeksforGeeks CSV export. The header is checked as soon as the
//!   first line arrives, the bytes are kept under `<upload_dir>/<md5>.csv`, and
//!   the rows are normalized and appended to `stg_gfg_articles`. Sending the
//!   same bytes again stages nothing, because the MD5 file name already exists.
//!
//! Staged rows are validated and promoted by the next pipeline run.

use actix_web::web::{post, scope};
use actix_web::Scope;

mod upload;

const API_PATH: &str = "/api/data_sources/csv";

pub fn configure_routes() -> Scope {
    scope(API_PATH).route("/upload", post().to(upload::process))
}
