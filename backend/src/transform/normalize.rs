//! Cleaning of the known statement columns.
//!
//! Steps run in a fixed order, each only when its column exists:
//!
//! 1. `Statement Date` parsed to a date, rows sorted ascending (nulls last)
//! 2. currency columns: `$` and `,` stripped, parsed as amounts
//! 3. `Override Percent`: trailing `%` stripped, divided by 100
//! 4. rows whose `Product Option` mentions "renewal" dropped
//!
//! Values that do not parse become empty cells; nothing here fails.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::ColumnRoles;
use crate::models::{CellValue, Dataset};
use crate::parser::parse_number;

/// What the normalizer changed, for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    /// Non-empty date cells that did not parse.
    pub invalid_dates: usize,
    /// Non-empty currency cells that did not parse.
    pub invalid_amounts: usize,
    /// Non-empty percentage cells that did not parse.
    pub invalid_percents: usize,
    /// Rows removed by the exclusion filter.
    pub excluded_rows: usize,
}

/// Clean `dataset` in place according to `roles`.
pub fn normalize(dataset: &mut Dataset, roles: &ColumnRoles) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    if let Some(col) = dataset.column_index(&roles.date) {
        dataset.map_column(&roles.date, |cell| {
            let parsed = coerce_date(cell);
            if parsed.is_empty() && !cell.is_empty() {
                report.invalid_dates += 1;
            }
            parsed
        });
        sort_by_date(dataset, col);
    }

    for column in &roles.currency {
        dataset.map_column(column, |cell| {
            let parsed = CellValue::from_decimal(cell.as_text().and_then(|t| parse_currency(&t)));
            if parsed.is_empty() && !cell.is_empty() {
                report.invalid_amounts += 1;
            }
            parsed
        });
    }

    dataset.map_column(&roles.percent, |cell| {
        let parsed = CellValue::from_decimal(cell.as_text().and_then(|t| parse_percent(&t)));
        if parsed.is_empty() && !cell.is_empty() {
            report.invalid_percents += 1;
        }
        parsed
    });

    if let Some(col) = dataset.column_index(&roles.exclusion) {
        let term = roles.exclusion_term.to_lowercase();
        let before = dataset.row_count();
        dataset
            .rows_mut()
            .retain(|row| !contains_term(&row[col], &term));
        report.excluded_rows = before - dataset.row_count();
    }

    report
}

/// Stable ascending sort on the date column; empty dates go last.
fn sort_by_date(dataset: &mut Dataset, col: usize) {
    dataset.rows_mut().sort_by_key(|row| {
        let date = row[col].as_date();
        (date.is_none(), date)
    });
}

fn contains_term(cell: &CellValue, lowercase_term: &str) -> bool {
    cell.as_text()
        .is_some_and(|text| text.to_lowercase().contains(lowercase_term))
}

// =============================================================================
// Coercions
// =============================================================================

/// Date cell for the statement date column; time of day is dropped.
pub fn coerce_date(cell: &CellValue) -> CellValue {
    match cell {
        CellValue::Date(d) => CellValue::Date(*d),
        CellValue::DateTime(dt) => CellValue::Date(dt.date()),
        CellValue::Bool(_) | CellValue::Empty => CellValue::Empty,
        other => CellValue::from_date(other.as_text().and_then(|t| parse_date(&t))),
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%y",
    "%m-%d-%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
];

/// `%Y` happily reads "23" or "5" as a year, so short years are rejected
/// and left for the `%y` formats.
fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    (date.year() >= 1000).then_some(date)
}

/// Parse statement date text. Returns `None` for anything unrecognized.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return plausible(dt.date_naive());
    }
    if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        let year = text[0..4].parse().ok()?;
        let month = text[4..6].parse().ok()?;
        let day = text[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day).and_then(plausible);
    }

    DATETIME_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.date())
        .chain(
            DATE_FORMATS
                .iter()
                .filter_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok()),
        )
        .find_map(plausible)
}

/// `"$1,234.56"` → `1234.56`; anything left that is not a number → `None`.
pub fn parse_currency(text: &str) -> Option<Decimal> {
    let cleaned: String = text.chars().filter(|c| *c != '$' && *c != ',').collect();
    parse_number(&cleaned)
}

/// `"37.5%"` → `0.375`; plain numbers are treated as percents too (`"12"` → `0.12`).
pub fn parse_percent(text: &str) -> Option<Decimal> {
    let stripped = text.trim().trim_end_matches('%').trim();
    parse_number(stripped).map(|v| v / Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!(parse_currency("$1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_currency("-$5.00"), Some(dec("-5")));
        assert_eq!(parse_currency(" 12 "), Some(dec("12")));
        assert_eq!(parse_currency("N/A"), None);
        assert_eq!(parse_currency("$"), None);
    }

    #[test]
    fn test_percent_parsing() {
        assert_eq!(parse_percent("37.5%"), Some(dec("0.375")));
        assert_eq!(parse_percent("12%"), Some(dec("0.12")));
        assert_eq!(parse_percent(" 5 % "), Some(dec("0.05")));
        assert_eq!(parse_percent("abc%"), None);
    }

    #[test]
    fn test_date_parsing() {
        assert_eq!(parse_date("2023-05-01"), Some(ymd(2023, 5, 1)));
        assert_eq!(parse_date("05/01/2023"), Some(ymd(2023, 5, 1)));
        assert_eq!(parse_date("5/1/23"), Some(ymd(2023, 5, 1)));
        assert_eq!(parse_date("2023-05-01 13:45:00"), Some(ymd(2023, 5, 1)));
        assert_eq!(parse_date("2023-05-01T13:45:00Z"), Some(ymd(2023, 5, 1)));
        assert_eq!(parse_date("Jan 15, 2022"), Some(ymd(2022, 1, 15)));
        assert_eq!(parse_date("20240301"), Some(ymd(2024, 3, 1)));
        assert_eq!(parse_date("05/01/23 10:30"), Some(ymd(2023, 5, 1)));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2023-02-30"), None);
    }

    #[test]
    fn test_dates_sorted_ascending_nulls_last() {
        let mut ds = Dataset::new(
            vec!["Statement Date".into(), "Id".into()],
            vec![
                vec![text("2023-05-01"), text("a")],
                vec![text("garbage"), text("b")],
                vec![text("2022-01-01"), text("c")],
                vec![text("2024-03-01"), text("d")],
            ],
        );
        let report = normalize(&mut ds, &ColumnRoles::default());

        let ids: Vec<String> = ds.rows().iter().map(|r| r[1].to_string()).collect();
        assert_eq!(ids, vec!["c", "a", "d", "b"]);
        assert_eq!(ds.get(0, "Statement Date"), Some(&CellValue::Date(ymd(2022, 1, 1))));
        assert_eq!(ds.get(3, "Statement Date"), Some(&CellValue::Empty));
        assert_eq!(report.invalid_dates, 1);
    }

    #[test]
    fn test_currency_and_percent_columns() {
        let mut ds = Dataset::new(
            vec!["Split Amount".into(), "Override".into(), "Override Percent".into()],
            vec![
                vec![text("$1,234.56"), text("N/A"), text("37.5%")],
                vec![CellValue::Number(dec("10")), CellValue::Empty, text("x")],
            ],
        );
        let report = normalize(&mut ds, &ColumnRoles::default());

        assert_eq!(ds.get(0, "Split Amount"), Some(&CellValue::Number(dec("1234.56"))));
        assert_eq!(ds.get(1, "Split Amount"), Some(&CellValue::Number(dec("10"))));
        assert_eq!(ds.get(0, "Override"), Some(&CellValue::Empty));
        assert_eq!(ds.get(0, "Override Percent"), Some(&CellValue::Number(dec("0.375"))));
        assert_eq!(ds.get(1, "Override Percent"), Some(&CellValue::Empty));
        assert_eq!(report.invalid_amounts, 1);
        assert_eq!(report.invalid_percents, 1);
    }

    #[test]
    fn test_renewals_excluded() {
        let mut ds = Dataset::new(
            vec!["Product Option".into()],
            vec![
                vec![text("Annual Renewal")],
                vec![text("New Business")],
                vec![CellValue::Empty],
                vec![text("RENEWAL")],
            ],
        );
        let report = normalize(&mut ds, &ColumnRoles::default());

        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.get(0, "Product Option"), Some(&text("New Business")));
        assert_eq!(ds.get(1, "Product Option"), Some(&CellValue::Empty));
        assert_eq!(report.excluded_rows, 2);
    }

    #[test]
    fn test_unknown_columns_untouched() {
        let mut ds = Dataset::new(
            vec!["Agent".into(), "Notes".into()],
            vec![vec![text("$12"), text("37%")]],
        );
        let before = ds.clone();
        assert_eq!(normalize(&mut ds, &ColumnRoles::default()), NormalizeReport::default());
        assert_eq!(ds, before);
    }
}
