use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};

use super::error::DataError;
use super::model::Table;
use super::xlsx;

/// Magic bytes of a ZIP container (and therefore of every `.xlsx`).
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const UTF8_BOM: &str = "\u{feff}";

/// Extensions accepted by the upload dialog.
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["csv", "xlsx"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Which parser produced a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    DelimitedText,
    Spreadsheet,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::DelimitedText => write!(f, "CSV"),
            SourceFormat::Spreadsheet => write!(f, "Excel"),
        }
    }
}

/// Result of an upload: always a table, plus the message shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub table: Table,
    /// `Err` when neither format matched; `table` is then empty.
    pub outcome: Result<SourceFormat, DataError>,
}

impl Loaded {
    pub fn status_message(&self) -> String {
        match &self.outcome {
            Ok(format) => format!("{format} file loaded successfully!"),
            Err(e) => format!("Error loading the file: {e}"),
        }
    }
}

/// Load an upload, trying delimited text first and a workbook second.
///
/// Never fails: when both parsers reject the bytes the table is empty and
/// the error is carried in [`Loaded::outcome`].
pub fn load(bytes: &[u8], separator: u8) -> Loaded {
    match try_load(bytes, separator) {
        Ok((table, format)) => {
            log::info!(
                "Loaded {format} with {} rows and columns {:?}",
                table.n_rows(),
                table.column_names()
            );
            Loaded {
                table,
                outcome: Ok(format),
            }
        }
        Err(e) => {
            log::error!("Failed to load upload: {e}");
            Loaded {
                table: Table::empty(),
                outcome: Err(e),
            }
        }
    }
}

/// Strict variant of [`load`] that reports why each format was rejected.
pub fn try_load(bytes: &[u8], separator: u8) -> Result<(Table, SourceFormat), DataError> {
    let csv_err = match parse_delimited(bytes, separator) {
        Ok(table) => return Ok((table, SourceFormat::DelimitedText)),
        Err(e) => e,
    };
    log::debug!("Not delimited text: {csv_err:#}");

    match xlsx::read_workbook(bytes) {
        Ok(table) => Ok((table, SourceFormat::Spreadsheet)),
        Err(xlsx_err) => Err(DataError::UnsupportedFormat {
            csv: format!("{csv_err:#}"),
            xlsx: xlsx_err.to_string(),
        }),
    }
}

/// Reject uploads whose extension is not `.csv` or `.xlsx`.
pub fn check_extension(path: &Path) -> Result<(), DataError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(DataError::UnsupportedExtension(ext))
    }
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

/// Parse delimited text with a header row.
///
/// Binary input (a workbook, invalid UTF-8) and ragged records are errors so
/// that [`try_load`] falls through to the workbook parser.
pub fn parse_delimited(bytes: &[u8], separator: u8) -> Result<Table> {
    if bytes.starts_with(&ZIP_MAGIC) {
        bail!("input is a zip container");
    }
    let text = std::str::from_utf8(bytes).context("input is not valid UTF-8")?;
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("reading header row")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        bail!("missing header row");
    }

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {}", row_no + 1))?;
        rows.push(record.iter().map(|v| v.to_string()).collect());
    }

    Table::from_text_rows(headers, rows).context("building table")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{CellValue, ColumnKind};

    const BANK_CSV: &str = "age;job;marital;y\n30;admin.;married;no\n45;services;single;yes\n";

    #[test]
    fn loads_semicolon_delimited_text() {
        let loaded = load(BANK_CSV.as_bytes(), b';');
        assert_eq!(loaded.outcome, Ok(SourceFormat::DelimitedText));
        assert_eq!(loaded.table.column_names(), vec!["age", "job", "marital", "y"]);
        assert_eq!(loaded.table.n_rows(), 2);
        assert_eq!(loaded.table.column("age").unwrap().kind, ColumnKind::Integer);
        assert_eq!(loaded.status_message(), "CSV file loaded successfully!");
    }

    #[test]
    fn strips_byte_order_mark() {
        let with_bom = format!("{UTF8_BOM}{BANK_CSV}");
        let table = parse_delimited(with_bom.as_bytes(), b';').unwrap();
        assert!(table.has_column("age"));
    }

    #[test]
    fn falls_back_to_workbook() {
        let original = parse_delimited(BANK_CSV.as_bytes(), b';').unwrap();
        let bytes = xlsx::write_workbook(&original, "Sheet1").unwrap();

        let loaded = load(&bytes, b';');
        assert_eq!(loaded.outcome, Ok(SourceFormat::Spreadsheet));
        assert_eq!(loaded.table, original);
    }

    #[test]
    fn garbage_yields_empty_table_and_error() {
        let garbage: Vec<u8> = vec![0xff, 0xfe, 0x00, 0x12, 0x80, 0x81];
        let loaded = load(&garbage, b';');

        assert_eq!(loaded.table.n_rows(), 0);
        assert_eq!(loaded.table.n_cols(), 0);
        assert!(matches!(
            loaded.outcome,
            Err(DataError::UnsupportedFormat { .. })
        ));
        assert!(loaded.status_message().starts_with("Error loading the file"));
    }

    #[test]
    fn ragged_text_is_rejected() {
        let ragged = "a;b\n1;2;3\n";
        assert!(parse_delimited(ragged.as_bytes(), b';').is_err());
    }

    #[test]
    fn keeps_nulls_for_empty_fields() {
        let table = parse_delimited(b"age;y\n;no\n31;yes\n", b';').unwrap();
        assert_eq!(table.cell(0, 0), Some(&CellValue::Null));
        assert_eq!(table.cell(1, 0), Some(&CellValue::Integer(31)));
    }

    #[test]
    fn only_csv_and_xlsx_extensions_are_accepted() {
        assert!(check_extension(Path::new("bank.csv")).is_ok());
        assert!(check_extension(Path::new("BANK.XLSX")).is_ok());
        assert_eq!(
            check_extension(Path::new("bank.parquet")),
            Err(DataError::UnsupportedExtension("parquet".into()))
        );
    }
}
