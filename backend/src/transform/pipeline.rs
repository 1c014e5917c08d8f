//! High-level pipeline API: one statement file in, one workbook out.
//!
//! # Example
//!
//! ```rust,ignore
//! use statements::{transform, PipelineConfig};
//! use std::path::Path;
//!
//! let columns = vec!["Carrier".to_string(), "Split Amount".to_string()];
//! let report = transform(
//!     Path::new("uploads/q1.csv"),
//!     Path::new("outputs/q1_filtered.xlsx"),
//!     &columns,
//!     &PipelineConfig::default(),
//! )?;
//! println!("{} rows written", report.rows_written);
//! ```

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::normalize::{normalize, NormalizeReport};
use super::project::project;
use super::summary::build_summary;
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::parser::load_dataset;
use crate::writer::write_workbook;

/// Suffix appended to the input file stem for the output workbook.
pub const OUTPUT_SUFFIX: &str = "_filtered.xlsx";

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformReport {
    pub output: PathBuf,
    /// Columns present in the source file.
    pub source_columns: Vec<String>,
    /// Columns written to the data sheet, in order.
    pub columns_written: Vec<String>,
    pub rows_written: usize,
    /// `None` when the file has no statement date column.
    pub summary_rows: Option<usize>,
    pub normalize: NormalizeReport,
}

/// Run the full pipeline on one file.
///
/// 1. Load (CSV, or Excel with CSV fallback)
/// 2. Normalize dates, amounts and percentages; drop renewals
/// 3. Project onto the selected columns
/// 4. Write the data sheet and, with a date column, the yearly summary
pub fn transform(
    input: &Path,
    output: &Path,
    selected_columns: &[String],
    config: &PipelineConfig,
) -> PipelineResult<TransformReport> {
    log_info(format!("📖 Reading {}", input.display()));
    let mut dataset = load_dataset(input)?;
    let source_columns = dataset.columns().to_vec();
    log_success(format!(
        "{} rows, {} columns",
        dataset.row_count(),
        source_columns.len()
    ));

    log_info("🧹 Normalizing...");
    let normalize_report = normalize(&mut dataset, &config.roles);
    print_normalize_report(&normalize_report);

    let projected = project(&dataset, selected_columns);
    if projected.columns().is_empty() {
        log_warning("None of the selected columns exist in this file");
    } else {
        log_info_indent(format!("Keeping: {}", projected.columns().join(", ")), 1);
    }

    let summary = build_summary(&dataset, config);
    match &summary {
        Some(rows) => log_info(format!("📊 Yearly summary: {} carrier-year groups", rows.len())),
        None => log_warning(format!("No '{}' column, skipping yearly summary", config.roles.date)),
    }

    write_workbook(output, &projected, summary.as_deref(), &config.roles)?;
    log_success(format!("Wrote {}", output.display()));

    Ok(TransformReport {
        output: output.to_path_buf(),
        source_columns,
        columns_written: projected.columns().to_vec(),
        rows_written: projected.row_count(),
        summary_rows: summary.map(|rows| rows.len()),
        normalize: normalize_report,
    })
}

fn print_normalize_report(report: &NormalizeReport) {
    if report.invalid_dates > 0 {
        log_warning(format!("{} unreadable statement dates left empty", report.invalid_dates));
    }
    if report.invalid_amounts > 0 {
        log_warning(format!("{} unreadable amounts left empty", report.invalid_amounts));
    }
    if report.invalid_percents > 0 {
        log_warning(format!("{} unreadable percentages left empty", report.invalid_percents));
    }
    if report.excluded_rows > 0 {
        log_info(format!("Dropped {} renewal rows", report.excluded_rows));
    }
}

/// Output filename for an input file: `<stem>_filtered.xlsx`.
pub fn output_filename(input: &Path) -> String {
    format!("{}{}", file_stem(input), OUTPUT_SUFFIX)
}

fn file_stem(input: &Path) -> &str {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("statement")
}

/// Output filename not yet in `taken`, which it is then added to.
///
/// The first input with a given stem gets `<stem>_filtered.xlsx`; later ones
/// get `<stem>_<ext>_filtered.xlsx`, then a numeric suffix.
fn unique_output_filename(input: &Path, taken: &mut HashSet<String>) -> String {
    let mut name = output_filename(input);
    if taken.contains(&name) {
        let ext = input
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        let base = format!("{}_{}", file_stem(input), ext);
        name = format!("{}{}", base, OUTPUT_SUFFIX);
        let mut n = 2;
        while taken.contains(&name) {
            name = format!("{}_{}{}", base, n, OUTPUT_SUFFIX);
            n += 1;
        }
    }
    taken.insert(name.clone());
    name
}

// =============================================================================
// Batch
// =============================================================================

/// A file the batch could not process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub filename: String,
    pub error: String,
    /// The file type is not accepted at all.
    pub unsupported: bool,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Output filenames (inside the output directory), in input order.
    pub outputs: Vec<String>,
    pub failures: Vec<BatchFailure>,
}

/// Run [`transform`] over several files with one shared column selection.
///
/// Files are processed one after another. A failing file is logged and
/// reported; it never stops the others. Inputs sharing a stem get distinct
/// output names, so no output overwrites another from the same batch.
pub fn process_batch(
    inputs: &[PathBuf],
    output_dir: &Path,
    selected_columns: &[String],
    config: &PipelineConfig,
) -> BatchReport {
    let mut report = BatchReport::default();
    let mut taken = HashSet::new();

    for (i, input) in inputs.iter().enumerate() {
        log_info(format!("→ File {}/{}: {}", i + 1, inputs.len(), input.display()));
        let name = unique_output_filename(input, &mut taken);
        let output = output_dir.join(&name);

        match transform(input, &output, selected_columns, config) {
            Ok(_) => report.outputs.push(name),
            Err(e) => {
                log_error(format!("Failed to process {}: {}", input.display(), e));
                report.failures.push(BatchFailure {
                    filename: input
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    error: e.to_string(),
                    unsupported: e.is_client_error(),
                });
            }
        }
    }

    log_success(format!(
        "{} of {} files processed",
        report.outputs.len(),
        inputs.len()
    ));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LoadError, PipelineError};
    use crate::writer::{DATA_SHEET, SUMMARY_SHEET};
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use tempfile::tempdir;

    const STATEMENT: &str = "\
Statement Date,Carrier,Product Option,Split Amount,Override Percent,Agent
05/01/2023,Acme,New Business,\"$10,000.00\",37.5%,Kim
01/01/2022,Acme,Annual Renewal,\"$99,999.00\",10%,Kim
03/01/2024,Beta,New Business,\"$30,000.00\",12%,Lee
not a date,Beta,,N/A,,Lee
";

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn read_sheet(path: &Path, sheet: &str) -> (Vec<Vec<Data>>, Vec<Vec<String>>) {
        let mut wb: Xlsx<_> = open_workbook(path).unwrap();
        let values = wb
            .worksheet_range(sheet)
            .unwrap()
            .rows()
            .map(|r| r.to_vec())
            .collect();
        let formulas = wb
            .worksheet_formula(sheet)
            .unwrap()
            .rows()
            .map(|r| r.to_vec())
            .collect();
        (values, formulas)
    }

    #[test]
    fn test_end_to_end_csv() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("q1.csv");
        std::fs::write(&input, STATEMENT).unwrap();
        let output = dir.path().join(output_filename(&input));

        let report = transform(
            &input,
            &output,
            &columns(&["Split Amount", "Carrier", "Statement Date", "Missing"]),
            &PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(report.columns_written, vec!["Split Amount", "Carrier", "Statement Date"]);
        assert_eq!(report.rows_written, 3);
        assert_eq!(report.normalize.excluded_rows, 1);
        assert_eq!(report.normalize.invalid_dates, 1);
        assert_eq!(report.summary_rows, Some(2));

        let (data, _) = read_sheet(&output, DATA_SHEET);
        assert_eq!(data[0][0], Data::String("Split Amount".into()));
        // sorted by date, undated row last
        assert_eq!(data[1][0], Data::Float(10000.0));
        assert_eq!(data[2][0], Data::Float(30000.0));
        assert_eq!(data[3][1], Data::String("Beta".into()));
        assert_eq!(data[3][0], Data::Empty);

        let (summary, _) = read_sheet(&output, SUMMARY_SHEET);
        assert_eq!(summary[1][0], Data::String("Acme".into()));
        assert_eq!(summary[1][2], Data::Float(10000.0));
        assert_eq!(summary[2][0], Data::String("Beta".into()));
        assert_eq!(summary[2][5], Data::Float(40.0));
    }

    #[test]
    fn test_repeat_runs_identical() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("q1.csv");
        std::fs::write(&input, STATEMENT).unwrap();
        let first = dir.path().join("first.xlsx");
        let second = dir.path().join("second.xlsx");
        let selected = columns(&["Carrier", "Split Amount", "Override Percent"]);
        let config = PipelineConfig::default();

        transform(&input, &first, &selected, &config).unwrap();
        transform(&input, &second, &selected, &config).unwrap();

        for sheet in [DATA_SHEET, SUMMARY_SHEET] {
            assert_eq!(read_sheet(&first, sheet), read_sheet(&second, sheet));
        }
    }

    #[test]
    fn test_unsupported_type_is_typed_error() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("notes.txt");
        std::fs::write(&input, "hello").unwrap();
        let output = dir.path().join("notes_filtered.xlsx");

        let err = transform(&input, &output, &[], &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Load(LoadError::UnsupportedType(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_batch_isolates_failures() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path().join("outputs");
        std::fs::create_dir(&out_dir).unwrap();

        let good = dir.path().join("good.csv");
        std::fs::write(&good, STATEMENT).unwrap();
        let empty = dir.path().join("empty.csv");
        std::fs::write(&empty, "").unwrap();
        let unsupported = dir.path().join("scan.pdf");
        std::fs::write(&unsupported, "%PDF").unwrap();

        let report = process_batch(
            &[empty, good, unsupported],
            &out_dir,
            &columns(&["Carrier"]),
            &PipelineConfig::default(),
        );

        assert_eq!(report.outputs, vec!["good_filtered.xlsx"]);
        assert!(out_dir.join("good_filtered.xlsx").exists());
        assert!(!out_dir.join("empty_filtered.xlsx").exists());
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].filename, "empty.csv");
        assert!(!report.failures[0].unsupported);
        assert!(report.failures[1].unsupported);
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(output_filename(Path::new("up/Q1 2024.xlsx")), "Q1 2024_filtered.xlsx");
    }

    #[test]
    fn test_unique_output_filenames() {
        let mut taken = HashSet::new();
        let names: Vec<String> = ["a/q1.csv", "b/q1.XLS", "c/q1.xls", "q2.csv"]
            .iter()
            .map(|p| unique_output_filename(Path::new(p), &mut taken))
            .collect();
        assert_eq!(
            names,
            vec![
                "q1_filtered.xlsx",
                "q1_xls_filtered.xlsx",
                "q1_xls_2_filtered.xlsx",
                "q2_filtered.xlsx",
            ]
        );
    }

    #[test]
    fn test_batch_shared_stem_no_overwrite() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path().join("outputs");
        std::fs::create_dir(&out_dir).unwrap();

        let csv = dir.path().join("q1.csv");
        std::fs::write(&csv, STATEMENT).unwrap();
        // spreadsheet extension, CSV content: read through the fallback
        let xls = dir.path().join("q1.xls");
        std::fs::write(&xls, "Carrier,Split Amount\nZeta,5\n").unwrap();

        let report = process_batch(
            &[csv, xls],
            &out_dir,
            &columns(&["Carrier"]),
            &PipelineConfig::default(),
        );

        assert!(report.failures.is_empty());
        assert_eq!(report.outputs, vec!["q1_filtered.xlsx", "q1_xls_filtered.xlsx"]);
        assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 2);

        let (first, _) = read_sheet(&out_dir.join("q1_filtered.xlsx"), DATA_SHEET);
        assert_eq!(first[1][0], Data::String("Acme".into()));
        let (second, _) = read_sheet(&out_dir.join("q1_xls_filtered.xlsx"), DATA_SHEET);
        assert_eq!(second[1][0], Data::String("Zeta".into()));
    }
}
