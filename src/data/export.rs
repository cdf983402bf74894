use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::error::DataError;
use super::model::Table;
use super::xlsx;

/// Sheet name of every exported workbook.
pub const SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    DelimitedText,
    Spreadsheet,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::DelimitedText => "csv",
            ExportFormat::Spreadsheet => "xlsx",
        }
    }
}

/// Encoded bytes of a table, ready to be saved under `file_name`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub bytes: Arc<[u8]>,
    pub format: ExportFormat,
    pub file_name: String,
}

impl ExportArtifact {
    pub fn encode(table: &Table, format: ExportFormat, file_name: &str) -> Result<Self, DataError> {
        let bytes = match format {
            ExportFormat::DelimitedText => to_delimited_text(table),
            ExportFormat::Spreadsheet => to_spreadsheet(table),
        }
        .map_err(|e| DataError::Export(format!("{e:#}")))?;
        Ok(ExportArtifact {
            bytes: bytes.into(),
            format,
            file_name: file_name.to_string(),
        })
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)
            .with_context(|| format!("writing {}", path.display()))
    }
}

/// UTF-8, comma-delimited, header row, no index column.
pub fn to_delimited_text(table: &Table) -> Result<Vec<u8>> {
    if table.n_cols() == 0 {
        return Ok(Vec::new());
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.column_names())
        .context("writing header row")?;
    for row in 0..table.n_rows() {
        writer
            .write_record(table.columns().iter().map(|c| c.values[row].to_field()))
            .with_context(|| format!("writing row {row}"))?;
    }
    writer.into_inner().context("flushing delimited text")
}

/// Single-sheet workbook named [`SHEET_NAME`], header row, no index column.
pub fn to_spreadsheet(table: &Table) -> Result<Vec<u8>> {
    xlsx::write_workbook(table, SHEET_NAME).context("encoding workbook")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::parse_delimited;
    use crate::data::model::Column;

    fn bank() -> Table {
        Table::new(vec![
            Column::from_raw("age", &["30", "45", ""]),
            Column::from_raw("job", &["admin.", "blue-collar", "services"]),
            Column::from_raw("cons.price.idx", &["93.994", "92.893", "94.465"]),
            Column::from_raw("y", &["no", "yes", "no"]),
        ])
        .unwrap()
    }

    #[test]
    fn delimited_text_has_header_and_no_index() {
        let bytes = to_delimited_text(&bank()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("age,job,cons.price.idx,y"));
        assert_eq!(lines.next(), Some("30,admin.,93.994,no"));
        assert_eq!(lines.nth(1), Some(",services,94.465,no"));
    }

    #[test]
    fn delimited_text_reloads_identically() {
        let table = bank();
        let bytes = to_delimited_text(&table).unwrap();
        assert_eq!(parse_delimited(&bytes, b',').unwrap(), table);
    }

    #[test]
    fn encodings_are_deterministic() {
        let table = bank();
        for format in [ExportFormat::DelimitedText, ExportFormat::Spreadsheet] {
            let a = ExportArtifact::encode(&table, format, "bank").unwrap();
            let b = ExportArtifact::encode(&table, format, "bank").unwrap();
            assert_eq!(a.bytes, b.bytes);
        }
    }

    #[test]
    fn spreadsheet_artifact_is_a_workbook() {
        let artifact =
            ExportArtifact::encode(&bank(), ExportFormat::Spreadsheet, "bank_filtered.xlsx").unwrap();
        assert!(artifact.bytes.starts_with(b"PK"));
        assert_eq!(artifact.file_name, "bank_filtered.xlsx");
        assert_eq!(xlsx::read_workbook(&artifact.bytes).unwrap(), bank());
    }

    #[test]
    fn empty_table_exports_without_error() {
        let bytes = to_delimited_text(&Table::empty()).unwrap();
        assert!(bytes.is_empty());
        assert!(to_spreadsheet(&Table::empty()).is_ok());
    }
}
