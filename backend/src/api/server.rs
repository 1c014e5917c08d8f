//! HTTP server for the statement cleaner.
//!
//! Uploaded statements are saved under the upload directory, processed into
//! the output directory and served back from there.
//!
//! # API Endpoints
//!
//! | Method | Path                        | Description                         |
//! |--------|-----------------------------|-------------------------------------|
//! | GET    | `/health`                   | Health check                        |
//! | POST   | `/api/upload`               | Upload statements, list columns     |
//! | POST   | `/api/process`              | Clean uploaded files                |
//! | GET    | `/api/download/{filename}`  | Download one generated workbook     |
//! | GET    | `/api/download-all`         | Zip of several generated workbooks  |
//! | GET    | `/api/logs`                 | SSE stream for real-time logs       |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, Query, State},
    http::{header, Method},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::logs::{log_info, log_warning, LOG_BROADCASTER};
use super::types::{DownloadAllQuery, ProcessRequest, ProcessResponse, UploadResponse};
use crate::config::{PipelineConfig, ServerConfig};
use crate::error::{ServerError, ServerResult};
use crate::parser::{is_allowed_file, read_headers};
use crate::transform::pipeline::process_batch;

/// Largest accepted upload request.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Name of the archive served by `/api/download-all`.
const ZIP_NAME: &str = "processed_files.zip";

/// Shared handler state.
struct AppState {
    server: ServerConfig,
    pipeline: PipelineConfig,
}

/// Start the HTTP server
pub async fn start_server(
    server: ServerConfig,
    pipeline: PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(&server.upload_dir).await?;
    tokio::fs::create_dir_all(&server.output_dir).await?;

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let port = server.port;
    let state = Arc::new(AppState { server, pipeline });

    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload_files))
        .route("/api/process", post(process_files))
        .route("/api/download/{filename}", get(download_file))
        .route("/api/download-all", get(download_all))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Statements server running on http://localhost:{}", port);
    println!("   POST /api/upload              - Upload statements");
    println!("   POST /api/process             - Clean uploaded statements");
    println!("   GET  /api/download/{{name}}     - Download a workbook");
    println!("   GET  /api/download-all        - Download workbooks as zip");
    println!("   GET  /api/logs                - SSE log stream");
    println!("   GET  /health                  - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "statements",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "process": "POST /api/process",
            "download": "GET /api/download/{filename}",
            "downloadAll": "GET /api/download-all?filenames=a,b",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the dropped entries
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// =============================================================================
// Upload / Process
// =============================================================================

/// Save every acceptable `files` part and report the first file's columns.
async fn upload_files(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ServerResult<Json<UploadResponse>> {
    let mut saved = Vec::new();
    let mut rejected = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let original = field.file_name().unwrap_or_default().to_string();
        let name = sanitize_filename(&original);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;

        if name.is_empty() || !is_allowed_file(&name) {
            log_warning(format!("Rejected upload '{}'", original));
            rejected.push(original);
            continue;
        }

        tokio::fs::write(state.server.upload_dir.join(&name), &bytes).await?;
        log_info(format!("📄 Uploaded {} ({} bytes)", name, bytes.len()));
        saved.push(name);
    }

    let Some(first) = saved.first() else {
        return Err(ServerError::BadRequest(
            "No valid files uploaded (expected .csv, .xls or .xlsx)".into(),
        ));
    };

    let path = state.server.upload_dir.join(first);
    let columns = run_blocking(move || read_headers(&path)).await??;

    Ok(Json(UploadResponse {
        job_id: uuid::Uuid::new_v4().to_string(),
        filenames: saved,
        columns,
        rejected,
    }))
}

/// Run the batch over previously uploaded files.
async fn process_files(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProcessRequest>,
) -> ServerResult<Json<ProcessResponse>> {
    if request.filenames.is_empty() {
        return Err(ServerError::BadRequest("No files to process".into()));
    }

    let inputs = request
        .filenames
        .iter()
        .map(|name| Ok(state.server.upload_dir.join(checked_name(name)?)))
        .collect::<ServerResult<Vec<PathBuf>>>()?;

    log_info(format!("\n{}", "=".repeat(70)));
    log_info(format!("🧾 PROCESSING {} FILE(S)", inputs.len()));
    log_info("=".repeat(70));

    let report = {
        let state = Arc::clone(&state);
        run_blocking(move || {
            process_batch(
                &inputs,
                &state.server.output_dir,
                &request.selected_columns,
                &state.pipeline,
            )
        })
        .await?
    };

    Ok(Json(ProcessResponse::from(report)))
}

// =============================================================================
// Download
// =============================================================================

/// Send one generated workbook as an attachment.
async fn download_file(
    State(state): State<Arc<AppState>>,
    UrlPath(filename): UrlPath<String>,
) -> ServerResult<Response> {
    let name = checked_name(&filename)?;
    let bytes = match tokio::fs::read(state.server.output_dir.join(name)).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ServerError::NotFound(name.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    Ok(attachment(XLSX_CONTENT_TYPE, name, bytes))
}

/// Zip the listed workbooks that exist; missing ones are skipped.
async fn download_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadAllQuery>,
) -> ServerResult<Response> {
    let mut files = Vec::new();
    for name in query.names() {
        let name = checked_name(name)?;
        let path = state.server.output_dir.join(name);
        if tokio::fs::try_exists(&path).await? {
            files.push((name.to_string(), path));
        } else {
            log_warning(format!("Skipping missing output {}", name));
        }
    }

    if files.is_empty() {
        return Err(ServerError::NotFound("No processed files to download".into()));
    }

    let archive = run_blocking(move || zip_files(&files)).await??;
    Ok(attachment("application/zip", ZIP_NAME, archive))
}

fn attachment(content_type: &str, filename: &str, bytes: Vec<u8>) -> Response {
    let headers = [
        (header::CONTENT_TYPE, content_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    (headers, bytes).into_response()
}

/// Build a deflate zip of `(archive name, path)` pairs in memory.
fn zip_files(files: &[(String, PathBuf)]) -> ServerResult<Vec<u8>> {
    let zip_err = |e: zip::result::ZipError| ServerError::Internal(format!("Zip error: {}", e));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for (name, path) in files {
        let bytes = std::fs::read(path)?;
        zip.start_file(name.as_str(), options).map_err(zip_err)?;
        zip.write_all(&bytes)?;
    }

    Ok(zip.finish().map_err(zip_err)?.into_inner())
}

// =============================================================================
// Helpers
// =============================================================================

/// Reduce a client-supplied filename to a safe flat name.
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`; spaces become `_`; anything
/// else is dropped, as are leading dots.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            _ => None,
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// Accept a filename only when it is already in sanitized form.
fn checked_name(name: &str) -> ServerResult<&str> {
    if name.is_empty() || sanitize_filename(name) != name {
        return Err(ServerError::BadRequest(format!("Invalid filename: {}", name)));
    }
    Ok(name)
}

/// Run pipeline work off the async runtime.
async fn run_blocking<T, F>(work: F) -> ServerResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ServerError::Internal(format!("Worker failed: {}", e)))
}
