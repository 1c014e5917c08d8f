//! Domain models for the statement pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`CellValue`] - A single loosely-typed cell (text, number, date, ...)
//! - [`Dataset`] - Ordered rows over a per-file column set
//! - [`SummaryRow`] - One (carrier, year) line of the yearly summary
//! - [`BalanceCell`] - Literal balance or a formula chaining to the previous row

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Cell Values
// =============================================================================

/// A single cell of a statement file.
///
/// Input files have no fixed schema, so every column holds these and the
/// normalizer narrows the known columns to numbers or dates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    /// Missing or unparsable value.
    #[default]
    Empty,
    Text(String),
    Number(Decimal),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Textual rendering used by the text-based cleaning rules.
    ///
    /// Empty cells have no text, so rules applied to them keep them empty.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            other => Some(other.to_string()),
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            CellValue::Number(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }

    /// Wrap an optional number, mapping `None` to [`CellValue::Empty`].
    pub fn from_decimal(value: Option<Decimal>) -> Self {
        value.map_or(CellValue::Empty, CellValue::Number)
    }

    pub fn from_date(value: Option<NaiveDate>) -> Self {
        value.map_or(CellValue::Empty, CellValue::Date)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(d) => write!(f, "{}", d.normalize()),
            CellValue::Bool(true) => write!(f, "True"),
            CellValue::Bool(false) => write!(f, "False"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// One row; cells are positional and line up with [`Dataset::columns`].
pub type Row = Vec<CellValue>;

/// In-memory table loaded from one statement file.
///
/// Column names are unique (the loader de-duplicates them) and every row has
/// exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset, padding or truncating rows to the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let width = columns.len();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();
        Self { columns, index, rows }
    }

    /// A dataset with `row_count` rows and no columns.
    pub fn without_columns(row_count: usize) -> Self {
        Self::new(Vec::new(), vec![Vec::new(); row_count])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Cell at (`row`, column `name`), if both exist.
    pub fn get(&self, row: usize, name: &str) -> Option<&CellValue> {
        let col = self.column_index(name)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Rewrite every cell of column `name` in place. No-op if absent.
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> bool
    where
        F: FnMut(&CellValue) -> CellValue,
    {
        let Some(col) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            row[col] = f(&row[col]);
        }
        true
    }
}

// =============================================================================
// Yearly Summary
// =============================================================================

/// Balance column of a summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum BalanceCell {
    /// Plain number (first summary row).
    Literal(Decimal),
    /// Spreadsheet formula with `=` prefix, referencing sibling cells.
    Formula(String),
}

/// One (carrier, year) group of the yearly summary sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    /// `None` when the carrier cell (or the whole column) is empty.
    pub carrier: Option<String>,
    pub year: i32,
    /// Sum of split amounts, empty cells skipped.
    pub total: Decimal,
    /// `total × reimbursement rate`.
    pub reimbursed: Decimal,
    pub balance: BalanceCell,
    /// Value the balance evaluates to while override cells are untouched.
    pub running_balance: Decimal,
}
