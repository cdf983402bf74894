use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::DataError;
use super::model::Table;

/// Selection entry meaning "accept every value" in a multi-select.
pub const ALL: &str = "all";

// ---------------------------------------------------------------------------
// Single-column filters
// ---------------------------------------------------------------------------

/// Keep the rows whose `column` label is one of `selected`.
///
/// * `selected` contains [`ALL`] → the table is returned unchanged
/// * `selected` is empty → no row passes
/// * a zero-row table passes through even when `column` is absent
pub fn filter_multiselect(
    table: &Table,
    column: &str,
    selected: &[String],
) -> Result<Table, DataError> {
    if selected.iter().any(|s| s == ALL) || table.is_empty() {
        return Ok(table.clone());
    }
    let col = table
        .column(column)
        .ok_or_else(|| DataError::MissingColumn(column.to_string()))?;

    let accepted: HashSet<&str> = selected.iter().map(String::as_str).collect();
    let rows: Vec<usize> = col
        .values
        .iter()
        .enumerate()
        .filter(|(_, v)| accepted.contains(v.label().as_str()))
        .map(|(i, _)| i)
        .collect();
    Ok(table.select_rows(&rows))
}

/// Keep the rows where `min <= column <= max`. Nulls never pass.
pub fn filter_range(table: &Table, column: &str, min: f64, max: f64) -> Result<Table, DataError> {
    if table.is_empty() {
        return Ok(table.clone());
    }
    let col = table
        .column(column)
        .ok_or_else(|| DataError::MissingColumn(column.to_string()))?;
    if !col.kind.is_numeric() {
        return Err(DataError::NotNumeric(column.to_string()));
    }
    if min > max {
        return Err(DataError::InvalidRange {
            column: column.to_string(),
            min,
            max,
        });
    }

    let rows: Vec<usize> = col
        .values
        .iter()
        .enumerate()
        .filter(|(_, v)| {
            v.as_f64()
                .is_some_and(|x| min <= x && x <= max)
        })
        .map(|(i, _)| i)
        .collect();
    Ok(table.select_rows(&rows))
}

// ---------------------------------------------------------------------------
// FilterSpec – one stage of the chain
// ---------------------------------------------------------------------------

/// A column-scoped inclusion predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterSpec {
    Categorical { column: String, selected: Vec<String> },
    Range { column: String, min: f64, max: f64 },
}

impl FilterSpec {
    /// A range stage spanning the observed bounds of `column`.
    pub fn full_range(table: &Table, column: &str) -> Result<Self, DataError> {
        let (lo, hi) = observed_bounds(table, column)?;
        Ok(FilterSpec::Range {
            column: column.to_string(),
            min: lo,
            max: hi,
        })
    }

    /// A range stage; the bounds must be ordered and inside the observed bounds.
    pub fn range(table: &Table, column: &str, min: f64, max: f64) -> Result<Self, DataError> {
        let (lo, hi) = observed_bounds(table, column)?;
        if min > max {
            return Err(DataError::InvalidRange {
                column: column.to_string(),
                min,
                max,
            });
        }
        if min < lo || max > hi {
            return Err(DataError::RangeOutOfBounds {
                column: column.to_string(),
                min,
                max,
                lo,
                hi,
            });
        }
        Ok(FilterSpec::Range {
            column: column.to_string(),
            min,
            max,
        })
    }

    pub fn column(&self) -> &str {
        match self {
            FilterSpec::Categorical { column, .. } | FilterSpec::Range { column, .. } => column,
        }
    }

    pub fn apply(&self, table: &Table) -> Result<Table, DataError> {
        match self {
            FilterSpec::Categorical { column, selected } => {
                filter_multiselect(table, column, selected)
            }
            FilterSpec::Range { column, min, max } => filter_range(table, column, *min, *max),
        }
    }
}

fn observed_bounds(table: &Table, column: &str) -> Result<(f64, f64), DataError> {
    let col = table
        .column(column)
        .ok_or_else(|| DataError::MissingColumn(column.to_string()))?;
    if !col.kind.is_numeric() {
        return Err(DataError::NotNumeric(column.to_string()));
    }
    table
        .numeric_bounds(column)
        .ok_or_else(|| DataError::MissingColumn(column.to_string()))
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Row count after one stage, or why the stage was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub column: String,
    pub rows: usize,
    pub skipped: Option<DataError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    pub table: Table,
    pub stages: Vec<StageReport>,
}

impl ChainOutcome {
    /// Errors of skipped stages, in chain order.
    pub fn errors(&self) -> impl Iterator<Item = &DataError> {
        self.stages.iter().filter_map(|s| s.skipped.as_ref())
    }
}

/// Fold `stages` left to right over `table`.
///
/// A failing stage is skipped: it is reported and its input passes through.
pub fn apply_chain(table: &Table, stages: &[FilterSpec]) -> ChainOutcome {
    let mut current = table.clone();
    let mut reports = Vec::with_capacity(stages.len());

    for stage in stages {
        let skipped = match stage.apply(&current) {
            Ok(next) => {
                current = next;
                None
            }
            Err(e) => {
                log::warn!("Skipping filter on \"{}\": {e}", stage.column());
                Some(e)
            }
        };
        log::debug!("After \"{}\": {} rows", stage.column(), current.n_rows());
        reports.push(StageReport {
            column: stage.column().to_string(),
            rows: current.n_rows(),
            skipped,
        });
    }

    ChainOutcome {
        table: current,
        stages: reports,
    }
}

/// Labels offered by a multi-select: the column's unique labels followed by [`ALL`].
pub fn multiselect_options(table: &Table, column: &str) -> Option<Vec<String>> {
    let mut options = table.unique_labels(column)?;
    options.push(ALL.to_string());
    Some(options)
}
