//! Yearly reimbursement summary.
//!
//! Groups the cleaned statement rows by (carrier, year) over a trailing window
//! of years and chains a running balance through the groups. Every balance
//! after the first is a spreadsheet formula, so filling an override cell in
//! the "Reimbursed Amount" column later recomputes the rest of the sheet.
//!
//! ```text
//!   A        B     C                   D                      E                   F
//!   Carrier  Year  Total Split Amount  Reimbursement Account  Reimbursed Amount  Balance
//! 2 Acme     2023  10000               10                     N/A                10
//! 3 Acme     2024  20000               20                     N/A                =F2 + D3 - IF(ISNUMBER(E3), E3, 0)
//! ```

use chrono::Datelike;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::config::PipelineConfig;
use crate::models::{BalanceCell, Dataset, SummaryRow};

/// Header row of the summary sheet.
pub const SUMMARY_HEADERS: [&str; 6] = [
    "Carrier",
    "Year",
    "Total Split Amount",
    "Reimbursement Account",
    "Reimbursed Amount",
    "Balance",
];

/// Placeholder written in the user-editable override column.
pub const OVERRIDE_PLACEHOLDER: &str = "N/A";

/// Spreadsheet row (1-based) of the first summary data row.
pub const FIRST_DATA_ROW: usize = 2;

/// Balance formula for the summary row at spreadsheet row `row`.
pub fn balance_formula(row: usize) -> String {
    format!(
        "=F{prev} + D{row} - IF(ISNUMBER(E{row}), E{row}, 0)",
        prev = row - 1,
        row = row
    )
}

/// Grouping key: carriers sort by text with the empty carrier last.
type GroupKey = ((bool, Option<String>), i32);

/// Build the yearly summary, or `None` when there is no date column.
///
/// `dataset` must already be normalized (dates parsed, amounts numeric).
pub fn build_summary(dataset: &Dataset, config: &PipelineConfig) -> Option<Vec<SummaryRow>> {
    let roles = &config.roles;
    let date_col = dataset.column_index(&roles.date)?;
    let carrier_col = dataset.column_index(&roles.carrier);
    let amount_col = dataset.column_index(&roles.amount);

    let years: Vec<Option<i32>> = dataset
        .rows()
        .iter()
        .map(|row| row[date_col].as_date().map(|d| d.year()))
        .collect();

    let Some(max_year) = years.iter().flatten().max().copied() else {
        return Some(Vec::new());
    };
    let first_year = max_year - config.trailing_years;

    let mut groups: BTreeMap<GroupKey, Decimal> = BTreeMap::new();
    for (row, year) in dataset.rows().iter().zip(&years) {
        let Some(year) = *year else { continue };
        if year < first_year {
            continue;
        }
        let carrier = carrier_col.and_then(|c| row[c].as_text());
        let amount = amount_col.and_then(|c| row[c].as_decimal());

        let total = groups
            .entry(((carrier.is_none(), carrier), year))
            .or_insert(Decimal::ZERO);
        if let Some(amount) = amount {
            *total += amount;
        }
    }

    Some(chain_balances(groups, config.reimbursement_rate))
}

fn chain_balances(groups: BTreeMap<GroupKey, Decimal>, rate: Decimal) -> Vec<SummaryRow> {
    let mut running = Decimal::ZERO;

    groups
        .into_iter()
        .enumerate()
        .map(|(i, (((_, carrier), year), total))| {
            let reimbursed = total * rate;
            running += reimbursed;
            let balance = if i == 0 {
                BalanceCell::Literal(reimbursed)
            } else {
                BalanceCell::Formula(balance_formula(FIRST_DATA_ROW + i))
            };
            SummaryRow {
                carrier,
                year,
                total,
                reimbursed,
                balance,
                running_balance: running,
            }
        })
        .collect()
}
