//! Statement file loading with encoding and delimiter auto-detection.
//!
//! Turns a CSV or Excel file into a [`Dataset`]. The declared extension picks
//! the reader; spreadsheets that turn out not to be spreadsheets are re-read
//! as delimited text. No statement-specific logic here.

pub mod excel;

use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::api::logs::{log_info, log_warning};
use crate::config::ALLOWED_EXTENSIONS;
use crate::error::{LoadError, LoadResult};
use crate::models::{CellValue, Dataset, Row};

/// Bytes read when only the header row is needed.
const HEADER_PROBE_BYTES: u64 = 64 * 1024;

/// How a file will be read, from its declared extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Delimited,
    Spreadsheet,
}

impl FileKind {
    /// Classify a path by its lower-cased extension.
    pub fn from_path(path: &Path) -> LoadResult<Self> {
        let ext = extension_of(path);
        match ext.as_str() {
            ".csv" => Ok(FileKind::Delimited),
            ".xls" | ".xlsx" => Ok(FileKind::Spreadsheet),
            _ => Err(LoadError::UnsupportedType(ext)),
        }
    }
}

/// Lower-cased extension with its leading dot, or `""`.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Whether a filename has one of the accepted extensions.
pub fn is_allowed_file(name: &str) -> bool {
    let ext = extension_of(Path::new(name));
    ALLOWED_EXTENSIONS.contains(&ext.as_str())
}

// =============================================================================
// Entry points
// =============================================================================

/// Load a whole statement file.
///
/// Spreadsheet files that calamine cannot open (wrong container, corrupt
/// values) fall back to delimited-text parsing of the same bytes. A readable
/// sheet without a header row is an empty file, like an empty CSV.
pub fn load_dataset(path: &Path) -> LoadResult<Dataset> {
    match FileKind::from_path(path)? {
        FileKind::Delimited => load_delimited(path),
        FileKind::Spreadsheet => match excel::load_workbook(path) {
            Ok(Some(dataset)) => Ok(dataset),
            Ok(None) => Err(LoadError::EmptyFile),
            Err(sheet_err) => {
                log_warning(format!(
                    "{} is not a readable spreadsheet ({}), retrying as CSV",
                    path.display(),
                    sheet_err
                ));
                load_delimited(path).map_err(|csv_err| {
                    LoadError::ParseFailure(format!(
                        "spreadsheet: {}; delimited text: {}",
                        sheet_err, csv_err
                    ))
                })
            }
        },
    }
}

/// Header names of a statement file, from its first row only.
pub fn read_headers(path: &Path) -> LoadResult<Vec<String>> {
    match FileKind::from_path(path)? {
        FileKind::Delimited => delimited_headers(path),
        FileKind::Spreadsheet => match excel::read_headers(path) {
            Ok(Some(headers)) => Ok(headers),
            Ok(None) => Err(LoadError::EmptyFile),
            Err(sheet_err) => delimited_headers(path).map_err(|csv_err| {
                LoadError::ParseFailure(format!(
                    "spreadsheet: {}; delimited text: {}",
                    sheet_err, csv_err
                ))
            }),
        },
    }
}

fn load_delimited(path: &Path) -> LoadResult<Dataset> {
    let bytes = std::fs::read(path)?;
    let parsed = parse_bytes_auto(&bytes)?;
    log_info(format!(
        "Read {} rows (encoding {}, delimiter '{}')",
        parsed.dataset.row_count(),
        parsed.encoding,
        format_delimiter(parsed.delimiter)
    ));
    Ok(parsed.dataset)
}

fn delimited_headers(path: &Path) -> LoadResult<Vec<String>> {
    let mut bytes = Vec::new();
    File::open(path)?
        .take(HEADER_PROBE_BYTES)
        .read_to_end(&mut bytes)?;

    let encoding = detect_encoding(&bytes);
    let content = decode_content(&bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    let mut reader = csv_reader(&content, delimiter);
    let header = reader
        .records()
        .next()
        .ok_or(LoadError::EmptyFile)??;
    Ok(normalize_headers(header.iter().map(str::to_string).collect()))
}

// =============================================================================
// Encoding & delimiter detection
// =============================================================================

/// Result of parsing delimited text, with the detected settings.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub dataset: Dataset,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// Unknown encodings and invalid UTF-8 are decoded lossily.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Defaults to `,` when the header holds none of the candidates.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

// =============================================================================
// Delimited text
// =============================================================================

/// Parse delimited bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> LoadResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let dataset = parse_delimited(&content, delimiter)?;

    Ok(ParseResult {
        dataset,
        encoding,
        delimiter,
    })
}

/// Parse delimited text; the first record is the header.
///
/// Columns whose every non-blank cell is numeric become numbers, the rest
/// keep their text as written. Blank lines are skipped; short rows are padded with empty cells.
pub fn parse_delimited(content: &str, delimiter: char) -> LoadResult<Dataset> {
    let mut reader = csv_reader(content, delimiter);
    let mut records = reader.records();

    let header = records.next().ok_or(LoadError::EmptyFile)??;
    let columns = normalize_headers(header.iter().map(str::to_string).collect());
    if columns.is_empty() {
        return Err(LoadError::EmptyFile);
    }

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for record in records {
        let record = record?;
        if record.len() <= 1 && record.get(0).map_or(true, |f| f.trim().is_empty()) {
            continue;
        }
        raw_rows.push(record.iter().map(str::to_string).collect());
    }

    let numeric: Vec<bool> = (0..columns.len())
        .map(|col| {
            raw_rows
                .iter()
                .filter_map(|row| row.get(col))
                .filter(|v| !v.trim().is_empty())
                .all(|v| parse_number(v).is_some())
        })
        .collect();

    let rows: Vec<Row> = raw_rows
        .into_iter()
        .map(|raw| {
            raw.into_iter()
                .take(columns.len())
                .enumerate()
                .map(|(col, value)| {
                    if value.trim().is_empty() {
                        CellValue::Empty
                    } else if numeric[col] {
                        CellValue::from_decimal(parse_number(&value))
                    } else {
                        CellValue::Text(value)
                    }
                })
                .collect()
        })
        .collect();

    Ok(Dataset::new(columns, rows))
}

fn csv_reader(content: &str, delimiter: char) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes())
}

/// Name blank headers `Unnamed: <i>` and suffix repeats with `.1`, `.2`, ...
pub fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut headers = Vec::with_capacity(raw.len());

    for (i, name) in raw.into_iter().enumerate() {
        let name = name.trim().trim_matches('"').to_string();
        let base = if name.is_empty() {
            format!("Unnamed: {}", i)
        } else {
            name
        };

        let mut candidate = base.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        seen.insert(candidate.clone());
        headers.push(candidate);
    }

    headers
}

// =============================================================================
// Numbers
// =============================================================================

/// Parse a plain number (`12`, `-3.5`, `1e3`). No currency symbols.
pub fn parse_number(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let text = text.strip_prefix('+').unwrap_or(text);
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Convert a spreadsheet float using its shortest decimal representation.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    parse_number(&value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_simple_csv() {
        let csv = "Carrier,Split Amount\nAcme,\"$1,234.56\"\nBeta,$10";
        let ds = parse_delimited(csv, ',').unwrap();

        assert_eq!(ds.columns(), &["Carrier", "Split Amount"]);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.get(0, "Carrier"), Some(&CellValue::Text("Acme".into())));
        assert_eq!(
            ds.get(0, "Split Amount"),
            Some(&CellValue::Text("$1,234.56".into()))
        );
    }

    #[test]
    fn test_numeric_column_inference() {
        let csv = "a,b\n1,x\n2.5,3\n,4";
        let ds = parse_delimited(csv, ',').unwrap();

        assert_eq!(ds.get(1, "a"), Some(&CellValue::Number(Decimal::new(25, 1))));
        assert_eq!(ds.get(2, "a"), Some(&CellValue::Empty));
        // mixed column stays text
        assert_eq!(ds.get(1, "b"), Some(&CellValue::Text("3".into())));
    }

    #[test]
    fn test_text_cells_kept_verbatim() {
        let csv = "Agent,Amount,Note\n  Kim ,  12 ,\"a,  b \"\nLee,   ,x";
        let ds = parse_delimited(csv, ',').unwrap();

        assert_eq!(ds.get(0, "Agent"), Some(&CellValue::Text("  Kim ".into())));
        assert_eq!(ds.get(0, "Note"), Some(&CellValue::Text("a,  b ".into())));
        assert_eq!(ds.get(0, "Amount"), Some(&CellValue::Number(Decimal::from(12))));
        assert_eq!(ds.get(1, "Amount"), Some(&CellValue::Empty));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let csv = "a;b\n1;2\n\n3;4\n";
        let ds = parse_delimited(csv, ';').unwrap();
        assert_eq!(ds.row_count(), 2);
    }

    #[test]
    fn test_ragged_rows() {
        let csv = "a,b,c\n1,,3\n4\n5,6,7,8";
        let ds = parse_delimited(csv, ',').unwrap();

        assert_eq!(ds.get(0, "b"), Some(&CellValue::Empty));
        assert_eq!(ds.get(1, "c"), Some(&CellValue::Empty));
        assert_eq!(ds.rows()[2].len(), 3);
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_delimited("", ','), Err(LoadError::EmptyFile)));
    }

    #[test]
    fn test_header_normalization() {
        let headers = normalize_headers(vec![
            "Carrier".into(),
            "".into(),
            "Carrier".into(),
            " Override ".into(),
            "Carrier".into(),
        ]);
        assert_eq!(
            headers,
            vec!["Carrier", "Unnamed: 1", "Carrier.1", "Override", "Carrier.2"]
        );
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_bom_stripped() {
        let ds = parse_bytes_auto("\u{feff}Carrier,Year\nA,2024".as_bytes()).unwrap();
        assert_eq!(ds.dataset.columns()[0], "Carrier");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 42 "), Some(Decimal::from(42)));
        assert_eq!(parse_number("+1.5"), Some(Decimal::new(15, 1)));
        assert_eq!(parse_number("1e3"), Some(Decimal::from(1000)));
        assert_eq!(parse_number("$5"), None);
        assert_eq!(parse_number("nan"), None);
    }

    #[test]
    fn test_decimal_from_f64_shortest() {
        assert_eq!(decimal_from_f64(0.1), Some(Decimal::new(1, 1)));
        assert_eq!(decimal_from_f64(f64::NAN), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_dataset(Path::new("statement.pdf")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedType(ref e) if e == ".pdf"));
        assert!(is_allowed_file("Report.XLSX"));
        assert!(!is_allowed_file("notes.txt"));
    }

    #[test]
    fn test_spreadsheet_extension_falls_back_to_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mislabeled.xlsx");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Carrier,Split Amount").unwrap();
        writeln!(file, "Acme,$5").unwrap();

        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.columns(), &["Carrier", "Split Amount"]);
        assert_eq!(ds.row_count(), 1);

        let headers = read_headers(&path).unwrap();
        assert_eq!(headers, vec!["Carrier", "Split Amount"]);
    }

    #[test]
    fn test_blank_workbook_is_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blank.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        workbook.add_worksheet();
        workbook.save(&path).unwrap();

        assert!(matches!(load_dataset(&path), Err(LoadError::EmptyFile)));
        assert!(matches!(read_headers(&path), Err(LoadError::EmptyFile)));
    }

    #[test]
    fn test_read_headers_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("statement.csv");
        std::fs::write(&path, "Statement Date;Carrier;Override\n2024-01-01;A;$1\n").unwrap();

        let headers = read_headers(&path).unwrap();
        assert_eq!(headers, vec!["Statement Date", "Carrier", "Override"]);
    }
}
