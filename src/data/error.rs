use thiserror::Error;

/// Failures of the load → filter → aggregate pipeline.
///
/// Every variant is recoverable: the presentation layer turns it into a
/// status message and carries on with whatever table it already has.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// The upload parsed neither as delimited text nor as a workbook.
    #[error("unsupported file format (delimited text: {csv}; spreadsheet: {xlsx})")]
    UnsupportedFormat { csv: String, xlsx: String },

    /// The file extension is not one of the accepted upload types.
    #[error("unsupported file extension: .{0} (expected .csv or .xlsx)")]
    UnsupportedExtension(String),

    /// An expected column is absent from the table.
    #[error("column \"{0}\" not found")]
    MissingColumn(String),

    /// A range filter was requested on a column that is not numeric.
    #[error("column \"{0}\" is not numeric")]
    NotNumeric(String),

    #[error("invalid range for \"{column}\": {min} > {max}")]
    InvalidRange { column: String, min: f64, max: f64 },

    #[error("range [{min}, {max}] for \"{column}\" lies outside the observed [{lo}, {hi}]")]
    RangeOutOfBounds {
        column: String,
        min: f64,
        max: f64,
        lo: f64,
        hi: f64,
    },

    /// The filter chain removed every row. Soft: downstream stages still run.
    #[error("no rows match the selected filters")]
    EmptyResult,

    #[error("duplicate column name \"{0}\"")]
    DuplicateColumn(String),

    #[error("column \"{column}\" has {found} values, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("export failed: {0}")]
    Export(String),
}

impl DataError {
    /// Whether the condition should be shown as a warning rather than an error.
    pub fn is_soft(&self) -> bool {
        matches!(self, DataError::EmptyResult)
    }
}
