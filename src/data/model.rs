use std::collections::HashSet;
use std::fmt;

use super::error::DataError;

// ---------------------------------------------------------------------------
// CellValue – a single cell of a column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell of an
/// uploaded sheet. Categorical columns hold `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            // Debug keeps the decimal point so a float never reads back as an integer.
            CellValue::Float(v) => write!(f, "{v:?}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Numeric view of the cell, used by range filters and slider bounds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Text written to an exported field. Null becomes an empty field.
    pub fn to_field(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// The key a categorical selection is matched against.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// Inferred type of a whole column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    /// Infer the narrowest kind that fits every non-empty raw value.
    pub fn infer<S: AsRef<str>>(raw: &[S]) -> Self {
        let mut kind = ColumnKind::Integer;
        for value in raw.iter().map(|v| v.as_ref()).filter(|v| !v.is_empty()) {
            if kind == ColumnKind::Integer && value.parse::<i64>().is_ok() {
                continue;
            }
            if parse_finite(value).is_some() {
                kind = ColumnKind::Float;
                continue;
            }
            return ColumnKind::Text;
        }
        kind
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    /// Convert one raw value; `raw` must already fit this kind.
    fn convert(self, raw: &str) -> CellValue {
        if raw.is_empty() {
            return CellValue::Null;
        }
        match self {
            ColumnKind::Integer => raw
                .parse::<i64>()
                .map(CellValue::Integer)
                .unwrap_or(CellValue::Null),
            ColumnKind::Float => parse_finite(raw).map(CellValue::Float).unwrap_or(CellValue::Null),
            ColumnKind::Text => CellValue::Text(raw.to_string()),
        }
    }
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A named, homogeneous sequence of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind, values: Vec<CellValue>) -> Self {
        Column {
            name: name.into(),
            kind,
            values,
        }
    }

    /// Build a column from raw text, inferring its kind.
    pub fn from_raw<S: AsRef<str>>(name: impl Into<String>, raw: &[S]) -> Self {
        let kind = ColumnKind::infer(raw);
        let values = raw.iter().map(|v| kind.convert(v.as_ref())).collect();
        Column::new(name, kind, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

// ---------------------------------------------------------------------------
// Table – the complete loaded dataset
// ---------------------------------------------------------------------------

/// An ordered set of equally long, uniquely named columns.
///
/// Tables are never mutated after construction; filters derive new ones.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// The zero-row, zero-column table returned when an upload cannot be read.
    pub fn empty() -> Self {
        Table::default()
    }

    /// Validate the shape invariants and build a table.
    pub fn new(columns: Vec<Column>) -> Result<Self, DataError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(DataError::DuplicateColumn(col.name.clone()));
            }
        }
        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(DataError::RaggedColumn {
                    column: bad.name.clone(),
                    expected,
                    found: bad.len(),
                });
            }
        }
        Ok(Table { columns })
    }

    /// Build a table from a header and row-major raw text, inferring column kinds.
    ///
    /// Every row must have exactly one value per header.
    pub fn from_text_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, DataError> {
        let width = headers.len();
        if let Some(row) = rows.iter().find(|r| r.len() != width) {
            let column = headers
                .get(row.len().min(width.saturating_sub(1)))
                .cloned()
                .unwrap_or_default();
            return Err(DataError::RaggedColumn {
                column,
                expected: width,
                found: row.len(),
            });
        }

        let mut raw_columns: Vec<Vec<String>> = vec![Vec::with_capacity(rows.len()); width];
        for row in rows {
            for (col, value) in raw_columns.iter_mut().zip(row) {
                col.push(value);
            }
        }

        let columns = headers
            .into_iter()
            .zip(raw_columns)
            .map(|(name, raw)| Column::from_raw(name, &raw))
            .collect();
        Table::new(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Distinct display labels of a column in order of first appearance.
    pub fn unique_labels(&self, name: &str) -> Option<Vec<String>> {
        let col = self.column(name)?;
        let mut seen = HashSet::new();
        Some(
            col.values
                .iter()
                .map(CellValue::label)
                .filter(|label| seen.insert(label.clone()))
                .collect(),
        )
    }

    /// Observed `[min, max]` of a numeric column, ignoring nulls.
    pub fn numeric_bounds(&self, name: &str) -> Option<(f64, f64)> {
        let col = self.column(name)?;
        if !col.kind.is_numeric() {
            return None;
        }
        col.values
            .iter()
            .filter_map(CellValue::as_f64)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// New table holding the given rows, in the given order, renumbered from 0.
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|col| Column {
                name: col.name.clone(),
                kind: col.kind,
                values: rows.iter().map(|&r| col.values[r].clone()).collect(),
            })
            .collect();
        Table { columns }
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> Table {
        let rows: Vec<usize> = (0..self.n_rows().min(n)).collect();
        self.select_rows(&rows)
    }

    /// Cell at `(row, column index)`.
    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.columns.get(col)?.values.get(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn infers_whole_column_kinds() {
        assert_eq!(ColumnKind::infer(&["1", "2", ""]), ColumnKind::Integer);
        assert_eq!(ColumnKind::infer(&["1", "2.5"]), ColumnKind::Float);
        assert_eq!(ColumnKind::infer(&["1", "yes"]), ColumnKind::Text);
        assert_eq!(ColumnKind::infer(&["inf"]), ColumnKind::Text);
    }

    #[test]
    fn builds_from_text_rows() {
        let table = Table::from_text_rows(
            raw(&["age", "job"]),
            vec![raw(&["30", "admin."]), raw(&["", "services"])],
        )
        .unwrap();

        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column_names(), vec!["age", "job"]);
        assert_eq!(table.column("age").unwrap().kind, ColumnKind::Integer);
        assert_eq!(table.cell(1, 0), Some(&CellValue::Null));
        assert_eq!(table.cell(0, 1), Some(&CellValue::Text("admin.".into())));
    }

    #[test]
    fn rejects_duplicate_and_ragged_columns() {
        let dup = Table::from_text_rows(raw(&["a", "a"]), vec![raw(&["1", "2"])]);
        assert_eq!(dup, Err(DataError::DuplicateColumn("a".into())));

        let ragged = Table::from_text_rows(raw(&["a", "b"]), vec![raw(&["1"])]);
        assert!(matches!(ragged, Err(DataError::RaggedColumn { .. })));
    }

    #[test]
    fn unique_labels_keep_first_appearance_order() {
        let table = Table::new(vec![Column::from_raw("y", &["no", "yes", "no", "maybe"])]).unwrap();
        assert_eq!(
            table.unique_labels("y").unwrap(),
            vec!["no".to_string(), "yes".into(), "maybe".into()]
        );
        assert!(table.unique_labels("missing").is_none());
    }

    #[test]
    fn numeric_bounds_skip_nulls_and_text() {
        let table = Table::new(vec![
            Column::from_raw("age", &["40", "", "18", "65"]),
            Column::from_raw("job", &["a", "b", "c", "d"]),
        ])
        .unwrap();
        assert_eq!(table.numeric_bounds("age"), Some((18.0, 65.0)));
        assert_eq!(table.numeric_bounds("job"), None);
    }

    #[test]
    fn empty_table_has_no_rows_or_columns() {
        let table = Table::empty();
        assert_eq!(table.n_rows(), 0);
        assert_eq!(table.n_cols(), 0);
        assert!(table.is_empty());
        assert_eq!(table.head(5), table);
    }

    #[test]
    fn float_display_keeps_decimal_point() {
        assert_eq!(CellValue::Float(2.0).to_string(), "2.0");
        assert_eq!(CellValue::Null.to_field(), "");
    }
}
