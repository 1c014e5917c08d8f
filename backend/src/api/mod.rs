//! HTTP API module.
//!
//! This module provides the HTTP server, its request/response types and the
//! pipeline log stream.

pub mod server;
pub mod types;
pub mod logs;

pub use server::{sanitize_filename, start_server};
pub use types::*;
pub use logs::*;
