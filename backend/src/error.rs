//! Error types for the statement transformation pipeline.
//!
//! This module defines one error type per layer:
//!
//! - [`LoadError`] - Reading CSV/Excel input
//! - [`WriteError`] - Writing the output workbook
//! - [`PipelineError`] - Top-level per-file orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Value coercion never produces an error: unparsable dates, amounts and
//! percentages become empty cells instead.
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Loading Errors
// =============================================================================

/// Errors while loading a statement file into a dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File extension is not one of csv, xls, xlsx.
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// File is readable but not as a spreadsheet nor as delimited text.
    #[error("Unable to parse file: {0}")]
    ParseFailure(String),

    /// No header row.
    #[error("File is empty")]
    EmptyFile,
}

impl From<csv::Error> for LoadError {
    fn from(err: csv::Error) -> Self {
        LoadError::ParseFailure(err.to_string())
    }
}

// =============================================================================
// Writing Errors
// =============================================================================

/// Errors while producing the output workbook.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Workbook assembly failed (bad sheet name, row limit, ...).
    #[error("Workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Failed to write the workbook to disk.
    #[error("Failed to write workbook: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error returned by [`crate::transform::pipeline::transform`].
/// A batch records it for the failing file and moves on to the next one.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input could not be loaded.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Output could not be written.
    #[error("Write error: {0}")]
    Write(#[from] WriteError),
}

impl PipelineError {
    /// Whether the caller sent something we never accept (as opposed to a
    /// file we failed to read or write).
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::Load(LoadError::UnsupportedType(_)))
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Requested file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}

impl From<LoadError> for ServerError {
    fn from(err: LoadError) -> Self {
        ServerError::Pipeline(err.into())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for workbook writing.
pub type WriteResult<T> = Result<T, WriteError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
