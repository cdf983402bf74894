use std::collections::HashMap;

use super::error::DataError;
use super::model::{CellValue, Column, ColumnKind, Table};

/// Name of the share column in a [`ProportionTable`] converted to a table.
pub const PROPORTION_COLUMN: &str = "proportion";

/// Percentage share of each distinct value of an outcome column.
///
/// Entries are ordered by count, most frequent first, ties in order of first
/// appearance. Charts and exports both walk `entries` in this order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProportionTable {
    pub column: String,
    /// `(label, percentage in [0, 100])`
    pub entries: Vec<(String, f64)>,
}

impl ProportionTable {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    /// Two-column table (`<outcome column>`, `proportion`) for preview and export.
    pub fn to_table(&self) -> Table {
        let labels = self
            .entries
            .iter()
            .map(|(l, _)| CellValue::Text(l.clone()))
            .collect();
        let shares = self
            .entries
            .iter()
            .map(|(_, p)| CellValue::Float(*p))
            .collect();
        // An outcome column literally named "proportion" would clash with the share column.
        let share_name = if self.column == PROPORTION_COLUMN {
            format!("{PROPORTION_COLUMN}_share")
        } else {
            PROPORTION_COLUMN.to_string()
        };
        Table::new(vec![
            Column::new(self.column.clone(), ColumnKind::Text, labels),
            Column::new(share_name, ColumnKind::Float, shares),
        ])
        .unwrap_or_default()
    }
}

/// Frequency of each distinct value of `outcome`, as a percentage of the
/// non-null cells. Null cells are not a category.
///
/// A zero-row table yields an empty result, whether or not `outcome` exists.
pub fn proportions(table: &Table, outcome: &str) -> Result<ProportionTable, DataError> {
    let empty = ProportionTable {
        column: outcome.to_string(),
        entries: Vec::new(),
    };
    if table.is_empty() {
        return Ok(empty);
    }
    let col = table
        .column(outcome)
        .ok_or_else(|| DataError::MissingColumn(outcome.to_string()))?;

    // label → (count, first row)
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut non_null = 0usize;
    for (row, value) in col.values.iter().enumerate() {
        if matches!(value, CellValue::Null) {
            continue;
        }
        non_null += 1;
        counts.entry(value.label()).or_insert((0, row)).0 += 1;
    }
    if non_null == 0 {
        return Ok(empty);
    }

    let mut ordered: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(label, (count, first))| (label, count, first))
        .collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let total = non_null as f64;
    Ok(ProportionTable {
        entries: ordered
            .into_iter()
            .map(|(label, count, _)| (label, count as f64 / total * 100.0))
            .collect(),
        ..empty
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(values: &[&str]) -> Table {
        Table::new(vec![Column::from_raw("y", values)]).unwrap()
    }

    #[test]
    fn shares_sum_to_one_hundred() {
        let p = proportions(&outcome(&["yes", "no", "no", "no", "yes"]), "y").unwrap();
        let total: f64 = p.entries.iter().map(|(_, share)| share).sum();
        assert!((total - 100.0).abs() < 1e-6);
        assert_eq!(p.entries, vec![("no".to_string(), 60.0), ("yes".to_string(), 40.0)]);
    }

    #[test]
    fn null_outcomes_are_not_counted() {
        let p = proportions(&outcome(&["yes", "", "no", "no"]), "y").unwrap();
        assert_eq!(p.labels().collect::<Vec<_>>(), vec!["no", "yes"]);
        assert_eq!(crate::chart::percent_label(p.entries[0].1), "66.67%");
        assert_eq!(crate::chart::percent_label(p.entries[1].1), "33.33%");

        let all_null = proportions(&outcome(&["", ""]), "y").unwrap();
        assert!(all_null.is_empty());
    }

    #[test]
    fn most_frequent_first_then_first_seen() {
        let p = proportions(&outcome(&["b", "a", "c", "a", "b", "d"]), "y").unwrap();
        assert_eq!(p.labels().collect::<Vec<_>>(), vec!["b", "a", "c", "d"]);

        let tie = proportions(&outcome(&["no", "yes"]), "y").unwrap();
        assert_eq!(tie.labels().collect::<Vec<_>>(), vec!["no", "yes"]);
    }

    #[test]
    fn empty_table_gives_empty_result() {
        let p = proportions(&Table::empty(), "y").unwrap();
        assert!(p.is_empty());

        let no_rows = outcome(&[]);
        assert!(proportions(&no_rows, "y").unwrap().is_empty());
    }

    #[test]
    fn missing_outcome_column_is_reported() {
        let t = Table::new(vec![Column::from_raw("age", &["30"])]).unwrap();
        assert_eq!(proportions(&t, "y"), Err(DataError::MissingColumn("y".into())));
    }

    #[test]
    fn converts_to_two_column_table() {
        let p = proportions(&outcome(&["no", "no", "yes", "no"]), "y").unwrap();
        let t = p.to_table();
        assert_eq!(t.column_names(), vec!["y", PROPORTION_COLUMN]);
        assert_eq!(t.cell(0, 0), Some(&CellValue::Text("no".into())));
        assert_eq!(t.cell(0, 1), Some(&CellValue::Float(75.0)));
        assert_eq!(t.cell(1, 1), Some(&CellValue::Float(25.0)));
    }
}
