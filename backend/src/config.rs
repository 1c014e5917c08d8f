//! Pipeline and server configuration.
//!
//! The column-role table lives here so the normalizer, the summary and the
//! workbook writer all read the same names. Business parameters can be
//! overridden from the environment (a `.env` file is honoured).

use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::api::logs::log_warning;

/// Default reimbursement rate: 0.1% of the yearly split total.
pub const DEFAULT_REIMBURSEMENT_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Years kept before the most recent one (4 → a 5-year window).
pub const DEFAULT_TRAILING_YEARS: i32 = 4;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 10000;

/// File extensions the loader accepts (lower-case, with dot).
pub const ALLOWED_EXTENSIONS: [&str; 3] = [".csv", ".xls", ".xlsx"];

/// Number format for currency cells on the data sheet.
pub const CURRENCY_FORMAT: &str = "$#,##0.00";

/// Number format for the percentage column.
pub const PERCENT_FORMAT: &str = "0.00%";

/// Number format for the statement date column.
pub const DATE_FORMAT: &str = "MM/DD/YYYY";

// =============================================================================
// Column Roles
// =============================================================================

/// Semantic roles of known column names.
///
/// Any column not named here is passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRoles {
    /// Parsed to a date and used to sort and to derive `Year`.
    pub date: String,
    /// Stripped of `$` and `,` and parsed as amounts.
    pub currency: Vec<String>,
    /// `"12%"` → `0.12`.
    pub percent: String,
    /// Rows whose value contains [`ColumnRoles::exclusion_term`] are dropped.
    pub exclusion: String,
    /// Matched case-insensitively.
    pub exclusion_term: String,
    /// First grouping key of the summary.
    pub carrier: String,
    /// Summed per (carrier, year).
    pub amount: String,
}

impl Default for ColumnRoles {
    fn default() -> Self {
        Self {
            date: "Statement Date".to_string(),
            currency: vec![
                "Split Amount".to_string(),
                "Override".to_string(),
                "Override By Carrier".to_string(),
                "Split Amount By Carrier".to_string(),
            ],
            percent: "Override Percent".to_string(),
            exclusion: "Product Option".to_string(),
            exclusion_term: "renewal".to_string(),
            carrier: "Carrier".to_string(),
            amount: "Split Amount".to_string(),
        }
    }
}

impl ColumnRoles {
    pub fn is_currency(&self, column: &str) -> bool {
        self.currency.iter().any(|c| c == column)
    }

    /// Display format for a data-sheet column, if it has a role that needs one.
    pub fn number_format(&self, column: &str) -> Option<&'static str> {
        if self.is_currency(column) {
            Some(CURRENCY_FORMAT)
        } else if column == self.percent {
            Some(PERCENT_FORMAT)
        } else if column == self.date {
            Some(DATE_FORMAT)
        } else {
            None
        }
    }
}

// =============================================================================
// Pipeline Configuration
// =============================================================================

/// Everything the per-file pipeline needs besides its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub roles: ColumnRoles,
    /// Fraction of the yearly total credited to the balance.
    pub reimbursement_rate: Decimal,
    /// Rows older than `max year - trailing_years` are left out of the summary.
    pub trailing_years: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            roles: ColumnRoles::default(),
            reimbursement_rate: DEFAULT_REIMBURSEMENT_RATE,
            trailing_years: DEFAULT_TRAILING_YEARS,
        }
    }
}

impl PipelineConfig {
    /// Defaults, overridden by `STATEMENTS_REIMBURSEMENT_RATE` and
    /// `STATEMENTS_TRAILING_YEARS` when set.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Some(rate) = env_parse::<Decimal>("STATEMENTS_REIMBURSEMENT_RATE") {
            config.reimbursement_rate = rate;
        }
        if let Some(years) = env_parse::<i32>("STATEMENTS_TRAILING_YEARS") {
            if years >= 0 {
                config.trailing_years = years;
            } else {
                log_warning(format!("Ignoring negative STATEMENTS_TRAILING_YEARS={}", years));
            }
        }
        config
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Where the HTTP service keeps uploads and generated workbooks.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
        }
    }
}

impl ServerConfig {
    /// Defaults, overridden by `STATEMENTS_UPLOAD_DIR` / `STATEMENTS_OUTPUT_DIR`.
    pub fn from_env(port: u16) -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self {
            port,
            ..Self::default()
        };
        if let Ok(dir) = env::var("STATEMENTS_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("STATEMENTS_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        config
    }
}

/// Read and parse an env var; unparsable values are reported and ignored.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            log_warning(format!("Ignoring invalid {}={}", key, raw));
            None
        }
    }
}
