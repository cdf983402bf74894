//! Application settings, read from an optional JSON file.
//!
//! Every field has a default, so a config file only needs the keys it
//! overrides:
//!
//! ```json
//! { "outcome_column": "subscribed", "preview_rows": 10 }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chart::ChartKind;

/// Looked up in the working directory when no path is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "telemarketing.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A filterable column and the label of its control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterField {
    pub column: String,
    pub label: String,
}

impl FilterField {
    fn new(column: &str, label: &str) -> Self {
        FilterField {
            column: column.to_string(),
            label: label.to_string(),
        }
    }
}

/// Suggested file names of the downloadable artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportNames {
    pub filtered: String,
    pub filtered_csv: String,
    pub raw_proportions: String,
    pub filtered_proportions: String,
}

impl Default for ExportNames {
    fn default() -> Self {
        ExportNames {
            filtered: "bank_filtered.xlsx".into(),
            filtered_csv: "bank_filtered.csv".into(),
            raw_proportions: "bank_raw_y.xlsx".into(),
            filtered_proportions: "bank_y.xlsx".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Column whose value shares are charted.
    pub outcome_column: String,
    /// Numeric column of the dual-ended range control; always the first stage.
    pub range_filter: FilterField,
    /// Multi-select stages, applied in this order after the range.
    pub categorical_filters: Vec<FilterField>,
    /// Field separator of uploaded delimited text.
    pub csv_separator: char,
    /// Rows shown in the before/after previews.
    pub preview_rows: usize,
    /// Entries kept per memoization cache; 0 disables caching.
    pub cache_capacity: usize,
    pub branding_image: Option<PathBuf>,
    pub chart_kind: ChartKind,
    pub exports: ExportNames,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            outcome_column: "y".into(),
            range_filter: FilterField::new("age", "Age"),
            categorical_filters: vec![
                FilterField::new("job", "Job"),
                FilterField::new("marital", "Marital status"),
                FilterField::new("default", "Default"),
                FilterField::new("housing", "Has housing loan?"),
                FilterField::new("loan", "Has personal loan?"),
                FilterField::new("contact", "Contact method"),
                FilterField::new("month", "Contact month"),
                FilterField::new("day_of_week", "Day of week"),
            ],
            csv_separator: ';',
            preview_rows: 5,
            cache_capacity: 16,
            branding_image: None,
            chart_kind: ChartKind::Bar,
            exports: ExportNames::default(),
        }
    }
}

impl AppConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Config from `explicit`, else [`DEFAULT_CONFIG_FILE`] if present, else defaults.
    ///
    /// A file that cannot be used is reported and defaults are returned.
    pub fn resolve(explicit: Option<PathBuf>) -> (Self, Option<ConfigError>) {
        let path = match explicit {
            Some(path) => path,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return (AppConfig::default(), None);
                }
                default
            }
        };
        match AppConfig::load(&path) {
            Ok(config) => {
                log::info!("Using config {}", path.display());
                (config, None)
            }
            Err(e) => {
                log::error!("{e}");
                (AppConfig::default(), Some(e))
            }
        }
    }

    pub fn separator_byte(&self) -> u8 {
        // validate() guarantees an ASCII separator.
        self.csv_separator as u8
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.csv_separator.is_ascii() {
            return Err(ConfigError::Invalid(format!(
                "csv_separator must be ASCII, got {:?}",
                self.csv_separator
            )));
        }
        if self.outcome_column.is_empty() {
            return Err(ConfigError::Invalid("outcome_column is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bank_marketing_layout() {
        let config = AppConfig::default();
        assert_eq!(config.outcome_column, "y");
        assert_eq!(config.range_filter.column, "age");
        let columns: Vec<&str> = config
            .categorical_filters
            .iter()
            .map(|f| f.column.as_str())
            .collect();
        assert_eq!(
            columns,
            vec!["job", "marital", "default", "housing", "loan", "contact", "month", "day_of_week"]
        );
        assert_eq!(config.separator_byte(), b';');
        assert_eq!(config.exports.raw_proportions, "bank_raw_y.xlsx");
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let config =
            AppConfig::from_json(r#"{ "preview_rows": 10, "chart_kind": "pie" }"#).unwrap();
        assert_eq!(config.preview_rows, 10);
        assert_eq!(config.chart_kind, ChartKind::Pie);
        assert_eq!(config.outcome_column, "y");
    }

    #[test]
    fn rejects_bad_files() {
        assert!(matches!(
            AppConfig::from_json("{ not json"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            AppConfig::from_json(r#"{ "csv_separator": "é" }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unreadable_explicit_file_falls_back_to_defaults() {
        let (config, err) = AppConfig::resolve(Some(PathBuf::from("/nonexistent/telemarketing.json")));
        assert_eq!(config, AppConfig::default());
        assert!(matches!(err, Some(ConfigError::Read { .. })));
    }
}
