//! REST API request/response types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ServerError;
use crate::transform::pipeline::{BatchFailure, BatchReport};

/// Response to a file upload: what was saved and which columns can be picked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub job_id: String,

    /// Saved (sanitized) filenames, to be sent back to `/api/process`.
    pub filenames: Vec<String>,

    /// Header of the first saved file; the selection applies to every file.
    pub columns: Vec<String>,

    /// Uploaded files skipped for their extension.
    #[serde(default)]
    pub rejected: Vec<String>,
}

/// Column selection for a set of uploaded files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub filenames: Vec<String>,
    pub selected_columns: Vec<String>,
}

/// Outcome of `/api/process`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub job_id: String,
    /// Generated workbooks, downloadable from `/api/download/{name}`.
    pub outputs: Vec<String>,
    pub failures: Vec<FailedFile>,
}

/// A file the batch skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub filename: String,
    pub error: String,
}

impl From<BatchFailure> for FailedFile {
    fn from(failure: BatchFailure) -> Self {
        Self {
            filename: failure.filename,
            error: failure.error,
        }
    }
}

impl From<BatchReport> for ProcessResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            outputs: report.outputs,
            failures: report.failures.into_iter().map(FailedFile::from).collect(),
        }
    }
}

/// Query of `/api/download-all`.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadAllQuery {
    /// Comma-separated output filenames.
    #[serde(default)]
    pub filenames: String,
}

impl DownloadAllQuery {
    pub fn names(&self) -> Vec<&str> {
        self.filenames
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect()
    }
}

/// Create an error response body
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Pipeline(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ServerError::Pipeline(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}
