//! Spreadsheet reading through calamine.
//!
//! Only the first worksheet is read; its first used row holds the headers.

use calamine::{open_workbook, open_workbook_auto, Data, Range, Reader, Xlsx};
use chrono::NaiveTime;
use rust_decimal::Decimal;
use std::iter;
use std::path::Path;

use super::{decimal_from_f64, extension_of, normalize_headers};
use crate::models::{CellValue, Dataset, Row};

fn first_sheet(path: &Path) -> Result<Range<Data>, calamine::Error> {
    let mut workbook = open_workbook_auto(path)?;
    workbook
        .worksheet_range_at(0)
        .ok_or(calamine::Error::Msg("workbook has no worksheets"))?
}

/// Blank columns left of the used range; calamine starts ranges at the
/// first used column.
fn leading_columns(range: &Range<Data>) -> usize {
    range.start().map_or(0, |(_, col)| col as usize)
}

fn header_names(lead: usize, row: &[Data]) -> Vec<String> {
    normalize_headers(
        iter::repeat(String::new())
            .take(lead)
            .chain(row.iter().map(header_text))
            .collect(),
    )
}

/// Load the first worksheet as a dataset, or `None` when it has no header row.
pub fn load_workbook(path: &Path) -> Result<Option<Dataset>, calamine::Error> {
    let range = first_sheet(path)?;
    let lead = leading_columns(&range);
    let mut rows = range.rows();

    let Some(header_row) = rows.next() else {
        return Ok(None);
    };
    let columns = header_names(lead, header_row);

    let data: Vec<Row> = rows
        .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| {
            iter::repeat(CellValue::Empty)
                .take(lead)
                .chain(row.iter().map(convert_cell))
                .take(columns.len())
                .collect()
        })
        .collect();

    Ok(Some(Dataset::new(columns, data)))
}

/// Header names from the first used row of the first worksheet.
///
/// `.xlsx` sheets are streamed cell by cell and reading stops after the
/// header row; other formats go through the full range.
pub fn read_headers(path: &Path) -> Result<Option<Vec<String>>, calamine::Error> {
    if extension_of(path) == ".xlsx" {
        return xlsx_headers(path);
    }
    let range = first_sheet(path)?;
    let lead = leading_columns(&range);
    let header = range.rows().next().map(|row| header_names(lead, row));
    Ok(header)
}

fn xlsx_headers(path: &Path) -> Result<Option<Vec<String>>, calamine::Error> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(calamine::Error::Xlsx)?;
    let name = workbook
        .sheet_names()
        .into_iter()
        .next()
        .ok_or(calamine::Error::Msg("workbook has no worksheets"))?;
    let mut cells = workbook
        .worksheet_cells_reader(&name)
        .map_err(calamine::Error::Xlsx)?;

    let mut header_row = None;
    let mut headers: Vec<String> = Vec::new();
    while let Some(cell) = cells.next_cell().map_err(calamine::Error::Xlsx)? {
        let (row, col) = cell.get_position();
        let text = header_text(&Data::from(cell.get_value().clone()));
        match header_row {
            Some(current) if row > current => break,
            None if text.is_empty() => continue,
            _ => {}
        }
        header_row = Some(row);

        let col = col as usize;
        if headers.len() <= col {
            headers.resize(col + 1, String::new());
        }
        headers[col] = text;
    }

    Ok(header_row.map(|_| normalize_headers(headers)))
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Spreadsheet floats beyond the `Decimal` range keep their text form.
fn float_cell(value: f64) -> CellValue {
    match decimal_from_f64(value) {
        Some(d) => CellValue::Number(d),
        None => CellValue::Text(value.to_string()),
    }
}

/// Map a calamine cell onto the dataset's value model.
pub fn convert_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => float_cell(*f),
        Data::Int(i) => CellValue::Number(Decimal::from(*i)),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => float_cell(dt.as_f64()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) if ndt.time() == NaiveTime::MIN => CellValue::Date(ndt.date()),
            Some(ndt) => CellValue::DateTime(ndt),
            None => CellValue::Empty,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
