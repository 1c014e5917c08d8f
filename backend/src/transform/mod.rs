//! Transformation module.
//!
//! The per-file stages, run in this order by [`pipeline::transform`]:
//! - Normalize: typed dates, amounts and percentages; renewal rows dropped
//! - Project: keep the selected columns that exist
//! - Summary: per-carrier yearly totals with a chained running balance

pub mod normalize;
pub mod pipeline;
pub mod project;
pub mod summary;

pub use normalize::{normalize, NormalizeReport};
pub use pipeline::*;
pub use project::{available_columns, project};
pub use summary::{balance_formula, build_summary};
