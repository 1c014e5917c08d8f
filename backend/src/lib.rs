//! # Statements - commission statement cleaner
//!
//! Statements turns raw carrier commission exports (CSV or Excel) into a
//! cleaned workbook: the selected columns with proper number formats, plus a
//! yearly reimbursement summary whose running balance stays live in the
//! spreadsheet.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / Excel │────▶│   Parser    │────▶│  Normalize  │────▶│   Project   │────▶│ Writer xlsx │
//! │ (any enc.)  │     │ (fallback)  │     │ (typed, -R) │     │ (selection) │     │ (+ summary) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use statements::{transform, PipelineConfig};
//! use std::path::Path;
//!
//! let report = transform(
//!     Path::new("q1.csv"),
//!     Path::new("q1_filtered.xlsx"),
//!     &["Carrier".into(), "Split Amount".into()],
//!     &PipelineConfig::from_env(),
//! )?;
//! println!("Wrote {} rows", report.rows_written);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cell values, datasets and summary rows
//! - [`config`] - Column roles, rates and server settings
//! - [`parser`] - CSV/Excel loading with encoding and delimiter detection
//! - [`transform`] - Normalize, project, summarize and the pipeline
//! - [`writer`] - Output workbook
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Loading
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod writer;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    LoadError,
    LoadResult,
    PipelineError,
    PipelineResult,
    ServerError,
    WriteError,
};

// =============================================================================
// Re-exports - Models & Config
// =============================================================================

pub use models::{BalanceCell, CellValue, Dataset, Row, SummaryRow};

pub use config::{ColumnRoles, PipelineConfig, ServerConfig};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    load_dataset,
    read_headers,
    is_allowed_file,
    parse_bytes_auto,
    detect_encoding,
    detect_delimiter,
    decode_content,
    ParseResult,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    build_summary,
    normalize,
    project,
    NormalizeReport,
};

pub use transform::pipeline::{
    transform,
    process_batch,
    output_filename,
    TransformReport,
    BatchReport,
    BatchFailure,
};

pub use writer::write_workbook;

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{
    UploadResponse,
    ProcessRequest,
    ProcessResponse,
    error_response,
};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
