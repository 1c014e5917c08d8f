//! Column selection.

use std::collections::HashSet;

use crate::models::{Dataset, Row};

/// Selected columns that exist in `dataset`, in selection order, each once.
pub fn available_columns(dataset: &Dataset, selected: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    selected
        .iter()
        .filter(|name| dataset.has_column(name))
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Keep only the selected columns that exist, in the order they were selected.
///
/// Unknown names are ignored. With nothing left the result has no columns but
/// keeps one (empty) row per input row.
pub fn project(dataset: &Dataset, selected: &[String]) -> Dataset {
    let columns = available_columns(dataset, selected);
    if columns.is_empty() {
        return Dataset::without_columns(dataset.row_count());
    }

    let indices: Vec<usize> = columns
        .iter()
        .filter_map(|name| dataset.column_index(name))
        .collect();

    let rows: Vec<Row> = dataset
        .rows()
        .iter()
        .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
        .collect();

    Dataset::new(columns, rows)
}
