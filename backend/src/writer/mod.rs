//! Output workbook writer.
//!
//! Produces the "Filtered Data" sheet (projected rows, role-based number
//! formats) and, when a summary was built, the "Yearly Summary" sheet. The
//! workbook is assembled in memory and lands on disk in one rename, so a
//! failure never leaves a half-written file behind.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Formula, Workbook, Worksheet, XlsxError};
use std::fs;
use std::path::Path;

use crate::config::{ColumnRoles, CURRENCY_FORMAT};
use crate::error::WriteResult;
use crate::models::{BalanceCell, CellValue, Dataset, SummaryRow};
use crate::transform::summary::{OVERRIDE_PLACEHOLDER, SUMMARY_HEADERS};

pub const DATA_SHEET: &str = "Filtered Data";
pub const SUMMARY_SHEET: &str = "Yearly Summary";

/// Format of the reimbursement and balance columns of the summary.
const SUMMARY_AMOUNT_FORMAT: &str = "$#0.00";

const PLAIN_DATE_FORMAT: &str = "yyyy-mm-dd";
const PLAIN_DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Write the output workbook to `path`.
pub fn write_workbook(
    path: &Path,
    data: &Dataset,
    summary: Option<&[SummaryRow]>,
    roles: &ColumnRoles,
) -> WriteResult<()> {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name(DATA_SHEET)?;
    write_data_sheet(sheet, data, roles)?;

    if let Some(rows) = summary {
        let sheet = workbook.add_worksheet();
        sheet.set_name(SUMMARY_SHEET)?;
        write_summary_sheet(sheet, rows)?;
    }

    let buffer = workbook.save_to_buffer()?;
    persist(path, &buffer)
}

/// Write next to `path` first, then rename over it.
fn persist(path: &Path, bytes: &[u8]) -> WriteResult<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = Path::new(&partial);

    if let Err(e) = fs::write(partial, bytes).and_then(|_| fs::rename(partial, path)) {
        let _ = fs::remove_file(partial);
        return Err(e.into());
    }
    Ok(())
}

fn cell_row(index: usize) -> Result<u32, XlsxError> {
    u32::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}

fn cell_col(index: usize) -> Result<u16, XlsxError> {
    u16::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

// =============================================================================
// Filtered Data
// =============================================================================

fn write_data_sheet(
    sheet: &mut Worksheet,
    data: &Dataset,
    roles: &ColumnRoles,
) -> Result<(), XlsxError> {
    let header = Format::new().set_bold();
    let formats: Vec<Option<Format>> = data
        .columns()
        .iter()
        .map(|name| roles.number_format(name).map(|nf| Format::new().set_num_format(nf)))
        .collect();

    for (c, name) in data.columns().iter().enumerate() {
        sheet.write_string_with_format(0, cell_col(c)?, name, &header)?;
    }

    for (r, row) in data.rows().iter().enumerate() {
        let excel_row = cell_row(r + 1)?;
        for (c, value) in row.iter().enumerate() {
            write_cell(sheet, excel_row, cell_col(c)?, value, formats[c].as_ref())?;
        }
    }

    if !data.columns().is_empty() {
        sheet.autofit();
    }
    Ok(())
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &CellValue,
    format: Option<&Format>,
) -> Result<(), XlsxError> {
    let plain = Format::new();
    let fmt = format.unwrap_or(&plain);

    match value {
        CellValue::Empty => {
            if let Some(fmt) = format {
                sheet.write_blank(row, col, fmt)?;
            }
        }
        CellValue::Text(s) => {
            sheet.write_string_with_format(row, col, s, fmt)?;
        }
        CellValue::Number(d) => {
            sheet.write_number_with_format(row, col, to_f64(*d), fmt)?;
        }
        CellValue::Bool(b) => {
            sheet.write_boolean_with_format(row, col, *b, fmt)?;
        }
        CellValue::Date(d) => {
            let fallback = Format::new().set_num_format(PLAIN_DATE_FORMAT);
            sheet.write_datetime_with_format(row, col, d, format.unwrap_or(&fallback))?;
        }
        CellValue::DateTime(dt) => {
            let fallback = Format::new().set_num_format(PLAIN_DATETIME_FORMAT);
            sheet.write_datetime_with_format(row, col, dt, format.unwrap_or(&fallback))?;
        }
    }
    Ok(())
}

// =============================================================================
// Yearly Summary
// =============================================================================

fn write_summary_sheet(sheet: &mut Worksheet, rows: &[SummaryRow]) -> Result<(), XlsxError> {
    let header = Format::new().set_bold();
    let total_fmt = Format::new().set_num_format(CURRENCY_FORMAT);
    let amount_fmt = Format::new().set_num_format(SUMMARY_AMOUNT_FORMAT);

    for (c, name) in SUMMARY_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, cell_col(c)?, *name, &header)?;
    }

    for (i, summary) in rows.iter().enumerate() {
        let r = cell_row(i + 1)?;

        if let Some(carrier) = &summary.carrier {
            sheet.write_string(r, 0, carrier)?;
        }
        sheet.write_number(r, 1, summary.year)?;
        sheet.write_number_with_format(r, 2, to_f64(summary.total), &total_fmt)?;
        sheet.write_number_with_format(r, 3, to_f64(summary.reimbursed), &amount_fmt)?;
        sheet.write_string(r, 4, OVERRIDE_PLACEHOLDER)?;

        match &summary.balance {
            BalanceCell::Literal(value) => {
                sheet.write_number_with_format(r, 5, to_f64(*value), &amount_fmt)?;
            }
            BalanceCell::Formula(expression) => {
                let formula = Formula::new(expression)
                    .set_result(summary.running_balance.normalize().to_string());
                sheet.write_formula_with_format(r, 5, formula, &amount_fmt)?;
            }
        }
    }

    sheet.autofit();
    Ok(())
}
