use crate::config::AppConfig;
use crate::job_controller::state::JobsState;
use crate::pipeline::format_timestamp;
use crate::sources::fetch::parse_csv;
use crate::sources::{adapter_for, SourceAdapter};
use crate::store::RecordStore;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use common::model::platform::SourcePlatform;
use futures_util::StreamExt;
use log::info;
use md5::Context;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// Columns an export must carry for its rows to be keyed and validated.
const REQUIRED_HEADERS: [&str; 2] = ["title", "link"];

#[derive(Debug, Serialize)]
pub struct UploadOutcome {
    pub md5: String,
    /// False when identical bytes were uploaded before.
    pub new_file: bool,
    pub staged: usize,
}

/// Validate each CSV header cell.
/// - `header_str` is the raw header line (without trailing CR/LF).
/// - `header_re` is the precompiled regex used to validate each cell.
fn validate_header_cells(header_str: &str, header_re: &Regex) -> Result<(), String> {
    let mut cells = Vec::new();
    for cell in header_str.split(',') {
        let mut f = cell.trim();
        if f.starts_with('"') && f.ends_with('"') && f.len() >= 2 {
            f = &f[1..f.len() - 1];
        }
        if f.is_empty() {
            return Err("CSV header cells must not be empty".to_string());
        }
        if !header_re.is_match(f) {
            return Err(format!(
                "CSV header cell '{}' may only contain letters, spaces, '-' and '_'",
                f
            ));
        }
        cells.push(f);
    }
    for required in REQUIRED_HEADERS {
        if !cells.contains(&required) {
            return Err(format!("CSV header is missing the '{}' column", required));
        }
    }
    Ok(())
}

fn header_line(buf: &[u8]) -> Result<String, String> {
    let end = buf.iter().position(|&b| b == b'\n').unwrap_or(buf.len());
    let mut line = &buf[..end];
    if line.ends_with(b"\r") {
        line = &line[..line.len() - 1];
    }
    // Exports saved from spreadsheets often start with a BOM.
    let line = line.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(line);
    String::from_utf8(line.to_vec()).map_err(|_| "Header is not valid UTF-8".to_string())
}

/// - `200 OK` with an `UploadOutcome` JSON body.
/// - `400 Bad Request` with the reason when the upload is rejected.
pub(crate) async fn process(
    payload: Multipart,
    config: web::Data<AppConfig>,
    jobs_state: web::Data<JobsState>,
) -> impl Responder {
    let (md5, bytes) = match receive_csv(payload).await {
        Ok(received) => received,
        Err(e) => return HttpResponse::BadRequest().body(format!("Error: {}", e)),
    };

    let _guard = jobs_state.run_lock.lock().await;
    let config = config.get_ref().clone();
    let staged = tokio::task::spawn_blocking(move || store_and_stage(&config, md5, bytes)).await;
    match staged {
        Ok(Ok(outcome)) => HttpResponse::Ok().json(outcome),
        Ok(Err(e)) => HttpResponse::BadRequest().body(format!("Error: {}", e)),
        Err(join_err) => {
            HttpResponse::InternalServerError().body(format!("join error: {}", join_err))
        }
    }
}

/// Reads the `file` field, checking its header as soon as the first line is in.
async fn receive_csv(mut payload: Multipart) -> Result<(String, Vec<u8>), String> {
    let header_re =
        Regex::new(r"^[\p{L}\p{M}\s\-_]+$").map_err(|e| format!("Regex error: {}", e))?;
    let mut md5_hasher = Context::new();
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| e.to_string())?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));
        if name.as_deref() != Some("file") {
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
            .unwrap_or_default();
        if !filename.ends_with(".csv") {
            return Err("The file must end with .csv".to_string());
        }

        let mut buf: Vec<u8> = Vec::new();
        let mut header_validated = false;
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| e.to_string())?;
            md5_hasher.consume(&chunk);
            buf.extend_from_slice(&chunk);
            if !header_validated && buf.contains(&b'\n') {
                validate_header_cells(&header_line(&buf)?, &header_re)?;
                header_validated = true;
            }
        }
        if !header_validated {
            validate_header_cells(&header_line(&buf)?, &header_re)?;
        }
        bytes = Some(buf);
    }

    let bytes = bytes.ok_or("Missing file")?;
    Ok((format!("{:x}", md5_hasher.finalize()), bytes))
}

fn store_and_stage(config: &AppConfig, md5: String, bytes: Vec<u8>) -> Result<UploadOutcome, String> {
    fs::create_dir_all(&config.upload_dir).map_err(|e| e.to_string())?;
    let path: PathBuf = config.upload_dir.join(format!("{}.csv", md5));
    if path.exists() {
        info!("Upload {} already stored, nothing staged", md5);
        return Ok(UploadOutcome {
            md5,
            new_file: false,
            staged: 0,
        });
    }

    let raw = parse_csv(bytes.as_slice()).map_err(|e| e.to_string())?;
    let adapter = adapter_for(SourcePlatform::Gfg);
    let batch = adapter.normalize(&raw);

    let mut store = RecordStore::open(&config.database_path).map_err(|e| e.to_string())?;
    store
        .create_table(adapter.staging_table())
        .map_err(|e| e.to_string())?;
    let staged = store
        .stage_new(
            adapter.platform(),
            &batch,
            adapter.natural_key_column(),
            &format_timestamp(Utc::now()),
            config.chunk_size,
        )
        .map_err(|e| e.to_string())?
        .staged;

    // Written last so a failed staging can be retried with the same file.
    fs::write(&path, &bytes).map_err(|e| e.to_string())?;
    info!("Stored upload as {} and staged {} rows", path.display(), staged);
    Ok(UploadOutcome {
        md5,
        new_file: true,
        staged,
    })
}
