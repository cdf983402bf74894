use std::path::Path;
use std::sync::Arc;

use crate::cache::{KeyBuilder, MemoCache};
use crate::chart::{ChartKind, ChartModel};
use crate::color::ColorMap;
use crate::config::AppConfig;
use crate::data::aggregate::{ProportionTable, proportions};
use crate::data::error::DataError;
use crate::data::export::{ExportArtifact, ExportFormat};
use crate::data::filter::{ALL, ChainOutcome, FilterSpec, StageReport, apply_chain, multiselect_options};
use crate::data::loader::{self, Loaded};
use crate::data::model::{ColumnKind, Table};

pub const RAW_CHART_TITLE: &str = "Raw data";
pub const FILTERED_CHART_TITLE: &str = "Filtered data";

// ---------------------------------------------------------------------------
// Status messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        let text = text.into();
        log::info!("{text}");
        StatusMessage {
            level: StatusLevel::Info,
            text,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        let text = text.into();
        log::error!("{text}");
        StatusMessage {
            level: StatusLevel::Error,
            text,
        }
    }

    pub fn from_error(e: &DataError) -> Self {
        if e.is_soft() {
            log::warn!("{e}");
            StatusMessage {
                level: StatusLevel::Warning,
                text: e.to_string(),
            }
        } else {
            log::error!("{e}");
            StatusMessage {
                level: StatusLevel::Error,
                text: e.to_string(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Filter form – pending selections, committed only by `AppState::apply`
// ---------------------------------------------------------------------------

/// Dual-ended range control over a numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSelection {
    pub column: String,
    pub label: String,
    /// Observed bounds of the column in the raw table.
    pub lo: f64,
    pub hi: f64,
    pub min: f64,
    pub max: f64,
    /// Integer columns step by whole numbers.
    pub integer: bool,
}

impl RangeSelection {
    pub fn set_min(&mut self, value: f64) {
        self.min = self.snap(value).clamp(self.lo, self.max);
    }

    pub fn set_max(&mut self, value: f64) {
        self.max = self.snap(value).clamp(self.min, self.hi);
    }

    fn snap(&self, value: f64) -> f64 {
        if self.integer { value.round() } else { value }
    }
}

/// Multi-select control over a categorical column.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalSelection {
    pub column: String,
    pub label: String,
    /// Unique labels followed by [`ALL`]; `None` when the column is absent.
    pub options: Option<Vec<String>>,
    pub selected: Vec<String>,
}

impl CategoricalSelection {
    pub fn is_selected(&self, option: &str) -> bool {
        self.selected.iter().any(|s| s == option)
    }

    pub fn toggle(&mut self, option: &str) {
        if let Some(pos) = self.selected.iter().position(|s| s == option) {
            self.selected.remove(pos);
        } else {
            self.selected.push(option.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterForm {
    pub chart_kind: ChartKind,
    /// `None` when the range column is absent or not numeric.
    pub range: Option<RangeSelection>,
    pub categorical: Vec<CategoricalSelection>,
}

impl FilterForm {
    /// Defaults for a freshly loaded table: full range, "all" everywhere.
    pub fn for_table(table: &Table, config: &AppConfig) -> Self {
        let field = &config.range_filter;
        let range = table.numeric_bounds(&field.column).map(|(lo, hi)| RangeSelection {
            column: field.column.clone(),
            label: field.label.clone(),
            lo,
            hi,
            min: lo,
            max: hi,
            integer: table
                .column(&field.column)
                .is_some_and(|c| c.kind == ColumnKind::Integer),
        });
        let categorical = config
            .categorical_filters
            .iter()
            .map(|f| CategoricalSelection {
                column: f.column.clone(),
                label: f.label.clone(),
                options: multiselect_options(table, &f.column),
                selected: vec![ALL.to_string()],
            })
            .collect();
        FilterForm {
            chart_kind: config.chart_kind,
            range,
            categorical,
        }
    }

    /// Chain stages for `table`, range first.
    ///
    /// Columns are checked before use: a missing or unusable column yields
    /// an error instead of a stage. A table without columns yields neither,
    /// and a zero-row table gets no range stage.
    pub fn stages(&self, table: &Table, config: &AppConfig) -> (Vec<FilterSpec>, Vec<DataError>) {
        let mut stages = Vec::new();
        let mut errors = Vec::new();
        if table.n_cols() == 0 {
            return (stages, errors);
        }

        let range_column = &config.range_filter.column;
        let range = match &self.range {
            Some(sel) => Some(FilterSpec::range(table, &sel.column, sel.min, sel.max)),
            None if !table.has_column(range_column) => {
                Some(Err(DataError::MissingColumn(range_column.clone())))
            }
            None if table.is_empty() => None,
            None => Some(FilterSpec::full_range(table, range_column)),
        };
        match range {
            Some(Ok(spec)) => stages.push(spec),
            Some(Err(e)) => errors.push(e),
            None => {}
        }

        for sel in &self.categorical {
            if table.has_column(&sel.column) {
                stages.push(FilterSpec::Categorical {
                    column: sel.column.clone(),
                    selected: sel.selected.clone(),
                });
            } else {
                errors.push(DataError::MissingColumn(sel.column.clone()));
            }
        }
        (stages, errors)
    }
}

// ---------------------------------------------------------------------------
// Downloadable artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    FilteredTable,
    FilteredCsv,
    RawProportions,
    FilteredProportions,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full session state, independent of rendering.
pub struct AppState {
    pub config: AppConfig,

    /// Display name of the uploaded file.
    pub source_name: Option<String>,

    /// Upload result (None until the user loads a file). Never mutated.
    pub raw: Option<Arc<Loaded>>,

    /// Result of the last applied filter chain.
    pub outcome: Option<Arc<ChainOutcome>>,

    /// Pending selections edited by the side panel.
    pub form: FilterForm,

    /// Chart kind committed with the last apply.
    pub chart_kind: ChartKind,

    pub raw_proportions: Option<ProportionTable>,
    pub filtered_proportions: Option<ProportionTable>,

    /// Same category, same colour, in both charts.
    pub colors: ColorMap,

    /// Messages from the last upload.
    pub load_messages: Vec<StatusMessage>,
    /// Messages from the last applied chain.
    pub run_messages: Vec<StatusMessage>,
    /// Result of the last save.
    pub save_message: Option<StatusMessage>,

    load_cache: MemoCache<Arc<Loaded>>,
    filter_cache: MemoCache<Arc<ChainOutcome>>,
    export_cache: MemoCache<Result<ExportArtifact, DataError>>,
}

impl Default for AppState {
    fn default() -> Self {
        AppState::new(AppConfig::default())
    }
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let capacity = config.cache_capacity;
        let form = FilterForm::for_table(&Table::empty(), &config);
        Self {
            chart_kind: config.chart_kind,
            config,
            source_name: None,
            raw: None,
            outcome: None,
            form,
            raw_proportions: None,
            filtered_proportions: None,
            colors: ColorMap::new(&[]),
            load_messages: Vec::new(),
            run_messages: Vec::new(),
            save_message: None,
            load_cache: MemoCache::new(capacity),
            filter_cache: MemoCache::new(capacity),
            export_cache: MemoCache::new(capacity),
        }
    }

    pub fn raw_table(&self) -> Option<&Table> {
        self.raw.as_ref().map(|l| &l.table)
    }

    pub fn filtered_table(&self) -> Option<&Table> {
        self.outcome.as_ref().map(|o| &o.table)
    }

    pub fn stages(&self) -> &[StageReport] {
        self.outcome.as_ref().map_or(&[], |o| o.stages.as_slice())
    }

    /// All current messages, upload first.
    pub fn messages(&self) -> impl Iterator<Item = &StatusMessage> {
        self.load_messages
            .iter()
            .chain(&self.run_messages)
            .chain(&self.save_message)
    }

    /// Read an upload from disk. Only `.csv` and `.xlsx` are accepted.
    pub fn open_path(&mut self, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if let Err(e) = loader::check_extension(path) {
            self.load_messages = vec![StatusMessage::from_error(&e)];
            return;
        }
        match std::fs::read(path) {
            Ok(bytes) => self.load_bytes(&name, &bytes),
            Err(e) => {
                self.load_messages = vec![StatusMessage::error(format!("Error reading {name}: {e}"))];
            }
        }
    }

    /// Ingest an upload, reset the form to its defaults and run the chain once.
    pub fn load_bytes(&mut self, name: &str, bytes: &[u8]) {
        let separator = self.config.separator_byte();
        let key = KeyBuilder::new("load")
            .bytes(bytes)
            .bytes(&[separator])
            .finish();
        let loaded = self
            .load_cache
            .get_or_insert_with(key, || Arc::new(loader::load(bytes, separator)));

        let mut messages = vec![match &loaded.outcome {
            Ok(_) => StatusMessage::info(loaded.status_message()),
            Err(e) => StatusMessage::from_error(e),
        }];
        self.form = FilterForm::for_table(&loaded.table, &self.config);
        // A zero-row table has no observed bounds; its range stage is a no-op.
        if let (Ok(_), None, false) = (&loaded.outcome, &self.form.range, loaded.table.is_empty()) {
            let column = &self.config.range_filter.column;
            let e = if loaded.table.has_column(column) {
                DataError::NotNumeric(column.clone())
            } else {
                DataError::MissingColumn(column.clone())
            };
            messages.push(StatusMessage::from_error(&e));
        }

        self.load_messages = messages;
        self.save_message = None;
        self.source_name = Some(name.to_string());
        self.raw = Some(loaded);
        self.apply();
    }

    /// Commit every pending selection at once and recompute all derived views.
    pub fn apply(&mut self) {
        let Some(raw) = self.raw.clone() else {
            return;
        };
        let table = &raw.table;
        let mut messages = Vec::new();

        let (stages, skipped) = self.form.stages(table, &self.config);
        messages.extend(skipped.iter().map(StatusMessage::from_error));

        let key = KeyBuilder::new("filter")
            .table(table)
            .bytes(&serde_json::to_vec(&stages).unwrap_or_default())
            .finish();
        let outcome = self
            .filter_cache
            .get_or_insert_with(key, || Arc::new(apply_chain(table, &stages)));
        messages.extend(outcome.errors().map(StatusMessage::from_error));

        if outcome.table.is_empty() && !table.is_empty() {
            messages.push(StatusMessage::from_error(&DataError::EmptyResult));
        }

        let outcome_column = &self.config.outcome_column;
        self.raw_proportions = match proportions(table, outcome_column) {
            Ok(p) => Some(p),
            Err(e) => {
                messages.push(StatusMessage::from_error(&e));
                None
            }
        };
        // The raw table was already checked for the outcome column above.
        self.filtered_proportions = proportions(&outcome.table, outcome_column).ok();
        if self.raw_proportions.is_none() {
            self.filtered_proportions = None;
        }

        let labels: Vec<String> = self
            .raw_proportions
            .iter()
            .chain(&self.filtered_proportions)
            .flat_map(|p| p.labels().map(str::to_string))
            .collect();
        self.colors = ColorMap::new(&labels);

        log::info!(
            "Applied {} filter stages: {} of {} rows remain",
            stages.len(),
            outcome.table.n_rows(),
            table.n_rows()
        );
        self.chart_kind = self.form.chart_kind;
        self.outcome = Some(outcome);
        self.run_messages = messages;
    }

    /// Raw and filtered charts, in that order. Empty when the outcome column is missing.
    pub fn charts(&self) -> Vec<ChartModel> {
        let mut charts = Vec::new();
        if let Some(p) = &self.raw_proportions {
            charts.push(ChartModel::build(RAW_CHART_TITLE, self.chart_kind, p, &self.colors));
        }
        if let Some(p) = &self.filtered_proportions {
            charts.push(ChartModel::build(
                FILTERED_CHART_TITLE,
                self.chart_kind,
                p,
                &self.colors,
            ));
        }
        charts
    }

    /// Encode one of the downloadable artifacts.
    pub fn export(&mut self, artifact: Artifact) -> Result<ExportArtifact, DataError> {
        let names = &self.config.exports;
        let (table, format, file_name) = match artifact {
            Artifact::FilteredTable => (
                self.filtered_table().cloned(),
                ExportFormat::Spreadsheet,
                names.filtered.clone(),
            ),
            Artifact::FilteredCsv => (
                self.filtered_table().cloned(),
                ExportFormat::DelimitedText,
                names.filtered_csv.clone(),
            ),
            Artifact::RawProportions => (
                self.raw_proportions.as_ref().map(ProportionTable::to_table),
                ExportFormat::Spreadsheet,
                names.raw_proportions.clone(),
            ),
            Artifact::FilteredProportions => (
                self.filtered_proportions.as_ref().map(ProportionTable::to_table),
                ExportFormat::Spreadsheet,
                names.filtered_proportions.clone(),
            ),
        };
        let table = match table {
            Some(t) => t,
            None if matches!(artifact, Artifact::FilteredTable | Artifact::FilteredCsv) => {
                return Err(DataError::Export("no file loaded".into()));
            }
            None => return Err(DataError::MissingColumn(self.config.outcome_column.clone())),
        };

        let key = KeyBuilder::new("export")
            .table(&table)
            .str(format.extension())
            .str(&file_name)
            .finish();
        self.export_cache
            .get_or_insert_with(key, || ExportArtifact::encode(&table, format, &file_name))
    }

    /// Encode `artifact` and write it to `path`, recording the outcome.
    pub fn save(&mut self, artifact: Artifact, path: &Path) {
        let result = self
            .export(artifact)
            .map_err(|e| e.to_string())
            .and_then(|a| a.write_to(path).map_err(|e| format!("{e:#}")));
        self.save_message = Some(match result {
            Ok(()) => StatusMessage::info(format!("Saved {}", path.display())),
            Err(e) => StatusMessage::error(format!("Failed to save {}: {e}", path.display())),
        });
    }

    /// `(hits, misses)` summed over every cache.
    pub fn cache_stats(&self) -> (u64, u64) {
        [
            self.load_cache.stats(),
            self.filter_cache.stats(),
            self.export_cache.stats(),
        ]
        .iter()
        .fold((0, 0), |(h, m), (ch, cm)| (h + ch, m + cm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::xlsx;

    const SCENARIO: &str = "age;job;y\n25;admin.;yes\n35;services;no\n60;retired;no\n22;admin.;no\n45;student;yes\n";

    fn loaded(csv: &str) -> AppState {
        let mut state = AppState::default();
        state.load_bytes("bank.csv", csv.as_bytes());
        state
    }

    fn chart_texts(chart: &ChartModel) -> Vec<(String, String)> {
        chart
            .slices
            .iter()
            .map(|s| (s.label.clone(), s.text.clone()))
            .collect()
    }

    fn pairs(values: &[(&str, &str)]) -> Vec<(String, String)> {
        values
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn raw_and_filtered_proportions_end_to_end() {
        let mut state = loaded(SCENARIO);
        assert_eq!(state.filtered_table().unwrap().n_rows(), 5);

        let range = state.form.range.as_mut().unwrap();
        range.set_min(30.0);
        range.set_max(50.0);
        state.apply();

        assert_eq!(state.filtered_table().unwrap().n_rows(), 2);
        let charts = state.charts();
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].title, RAW_CHART_TITLE);
        assert_eq!(
            chart_texts(&charts[0]),
            pairs(&[("no", "60.00%"), ("yes", "40.00%")])
        );
        assert_eq!(charts[1].title, FILTERED_CHART_TITLE);
        assert_eq!(
            chart_texts(&charts[1]),
            pairs(&[("no", "50.00%"), ("yes", "50.00%")])
        );
        assert_eq!(
            charts[0].slices[1].color, charts[1].slices[1].color,
            "a category keeps its colour across charts"
        );
    }

    #[test]
    fn missing_columns_are_reported_and_skipped() {
        let state = loaded(SCENARIO);
        let missing: Vec<&str> = state
            .run_messages
            .iter()
            .filter(|m| m.level == StatusLevel::Error)
            .map(|m| m.text.as_str())
            .collect();
        // Every configured categorical column except "job" is absent.
        assert_eq!(missing.len(), 7);
        assert!(missing.contains(&"column \"marital\" not found"));
        assert_eq!(state.filtered_table().unwrap().n_rows(), 5);
    }

    #[test]
    fn missing_range_column_is_reported_on_load() {
        let state = loaded("job;y\nadmin.;no\n");
        assert!(state
            .load_messages
            .iter()
            .any(|m| m.text == "column \"age\" not found"));
        assert!(state.form.range.is_none());
        assert_eq!(state.filtered_table().unwrap().n_rows(), 1);
    }

    #[test]
    fn selections_take_effect_only_on_apply() {
        let mut state = loaded(SCENARIO);
        let job = &mut state.form.categorical[0];
        job.toggle(ALL);
        job.toggle("admin.");
        state.form.chart_kind = ChartKind::Pie;

        assert_eq!(state.filtered_table().unwrap().n_rows(), 5);
        assert_eq!(state.chart_kind, ChartKind::Bar);

        state.apply();
        assert_eq!(state.filtered_table().unwrap().n_rows(), 2);
        assert_eq!(state.chart_kind, ChartKind::Pie);
    }

    #[test]
    fn empty_result_is_a_soft_warning() {
        let mut state = loaded(SCENARIO);
        state.form.categorical[0].selected.clear();
        state.apply();

        assert_eq!(state.filtered_table().unwrap().n_rows(), 0);
        assert!(state
            .run_messages
            .iter()
            .any(|m| m.level == StatusLevel::Warning));
        assert!(state.filtered_proportions.as_ref().unwrap().is_empty());
        assert_eq!(state.charts()[1].slices.len(), 0);
    }

    #[test]
    fn garbage_upload_does_not_break_the_pipeline() {
        let mut state = AppState::default();
        state.load_bytes("bank.csv", &[0xff, 0x00, 0xfe, 0x81]);

        let raw = state.raw_table().unwrap();
        assert_eq!((raw.n_rows(), raw.n_cols()), (0, 0));
        assert_eq!(state.load_messages[0].level, StatusLevel::Error);
        assert!(state.run_messages.is_empty());
        assert!(state.raw_proportions.as_ref().unwrap().is_empty());
        assert!(state.export(Artifact::FilteredTable).is_ok());
    }

    #[test]
    fn exports_use_configured_names() {
        let mut state = loaded(SCENARIO);
        let filtered = state.export(Artifact::FilteredTable).unwrap();
        assert_eq!(filtered.file_name, "bank_filtered.xlsx");
        assert_eq!(
            xlsx::read_workbook(&filtered.bytes).unwrap(),
            *state.filtered_table().unwrap()
        );

        let raw_y = state.export(Artifact::RawProportions).unwrap();
        assert_eq!(raw_y.file_name, "bank_raw_y.xlsx");
        let y = state.export(Artifact::FilteredProportions).unwrap();
        assert_eq!(y.file_name, "bank_y.xlsx");
        let csv = state.export(Artifact::FilteredCsv).unwrap();
        assert!(csv.bytes.starts_with(b"age,job,y\n"));
    }

    #[test]
    fn repeated_inputs_hit_the_cache() {
        let mut state = loaded(SCENARIO);
        let (hits_before, _) = state.cache_stats();

        state.load_bytes("bank.csv", SCENARIO.as_bytes());
        state.export(Artifact::FilteredTable).unwrap();
        state.export(Artifact::FilteredTable).unwrap();

        let (hits_after, _) = state.cache_stats();
        // load + filter on reload, then the second export.
        assert_eq!(hits_after - hits_before, 3);
    }

    #[test]
    fn export_without_upload_is_an_error() {
        let mut state = AppState::default();
        assert!(state.export(Artifact::FilteredTable).is_err());
        assert!(state.charts().is_empty());
    }

    const BANK: &str = "age;job;marital;default;housing;loan;contact;month;day_of_week;y\n\
30;admin.;married;no;yes;no;cellular;may;mon;no\n\
40;admin.;single;no;no;no;cellular;may;tue;yes\n\
50;services;married;no;yes;yes;telephone;jun;mon;no\n\
60;retired;married;no;no;no;cellular;jun;fri;yes\n\
35;admin.;married;no;yes;no;cellular;may;thu;yes\n";

    fn select(state: &mut AppState, column: &str, values: &[&str]) {
        let sel = state
            .form
            .categorical
            .iter_mut()
            .find(|s| s.column == column)
            .unwrap();
        sel.selected = values.iter().map(|v| v.to_string()).collect();
    }

    #[test]
    fn nine_stage_chain_runs_in_configured_order() {
        let mut state = loaded(BANK);
        let range = state.form.range.as_mut().unwrap();
        range.set_min(30.0);
        range.set_max(50.0);
        select(&mut state, "job", &["admin."]);
        select(&mut state, "housing", &["yes"]);
        select(&mut state, "day_of_week", &["mon"]);
        state.apply();

        assert!(state.run_messages.is_empty());
        let reports: Vec<(&str, usize)> = state
            .stages()
            .iter()
            .map(|r| (r.column.as_str(), r.rows))
            .collect();
        assert_eq!(
            reports,
            vec![
                ("age", 4),
                ("job", 3),
                ("marital", 3),
                ("default", 3),
                ("housing", 2),
                ("loan", 2),
                ("contact", 2),
                ("month", 2),
                ("day_of_week", 1),
            ]
        );
        assert!(state.stages().iter().all(|r| r.skipped.is_none()));
        assert_eq!(
            state.filtered_proportions.as_ref().unwrap().entries,
            vec![("no".to_string(), 100.0)]
        );
    }

    #[test]
    fn header_only_upload_reports_nothing() {
        let state = loaded("age;job;marital;default;housing;loan;contact;month;day_of_week;y\n");

        assert_eq!(state.raw_table().unwrap().n_cols(), 10);
        assert!(state.load_messages.iter().all(|m| m.level == StatusLevel::Info));
        assert!(state.run_messages.is_empty());
        assert!(state.form.range.is_none());

        let stages = state.stages();
        assert_eq!(stages.len(), 8);
        assert_eq!(stages[0].column, "job");
        assert!(stages.iter().all(|r| r.rows == 0 && r.skipped.is_none()));
        assert!(state.raw_proportions.as_ref().unwrap().is_empty());
    }
}
