use eframe::egui::{self, Color32, RichText, TextureHandle, Ui};

use crate::config::{AppConfig, ConfigError};
use crate::data::error::DataError;
use crate::state::{AppState, Artifact, StatusMessage};
use crate::ui::{panels, plot, table_view};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct TelemarketingApp {
    pub state: AppState,
    branding: Option<TextureHandle>,
}

impl TelemarketingApp {
    pub fn new(ctx: &egui::Context, config: AppConfig, config_error: Option<ConfigError>) -> Self {
        let mut startup = Vec::new();
        if let Some(e) = config_error {
            startup.push(StatusMessage::error(format!("{e}; using defaults")));
        }

        let branding = match &config.branding_image {
            Some(path) => match panels::load_branding(ctx, path) {
                Ok(texture) => Some(texture),
                Err(e) => {
                    startup.push(StatusMessage::error(format!("{e:#}")));
                    None
                }
            },
            None => None,
        };

        let mut state = AppState::new(config);
        state.load_messages = startup;
        Self { state, branding }
    }
}

impl eframe::App for TelemarketingApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Bottom panel: status messages ----
        egui::TopBottomPanel::bottom("status_bar")
            .resizable(true)
            .max_height(120.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui: &mut Ui| {
                    panels::status_bar(ui, &self.state);
                });
            });

        // ---- Left side panel: filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state, self.branding.as_ref());
            });

        // ---- Central panel: previews, downloads, charts ----
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui: &mut Ui| central_panel(ui, &mut self.state));
        });
    }
}

fn central_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Telemarketing analysis");
    ui.separator();

    let (Some(raw), Some(filtered)) = (state.raw.clone(), state.outcome.clone()) else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a CSV or Excel file to start  (File → Open…)");
        });
        return;
    };
    let rows = state.config.preview_rows;

    ui.strong("Before filters");
    table_view::preview(ui, "raw_preview", &raw.table, rows);
    ui.add_space(8.0);

    ui.strong("After filters");
    table_view::preview(ui, "filtered_preview", &filtered.table, rows);
    if filtered.table.is_empty() && !raw.table.is_empty() {
        ui.label(RichText::new(DataError::EmptyResult.to_string()).color(Color32::YELLOW));
    }
    ui.horizontal(|ui: &mut Ui| {
        download_button(ui, state, Artifact::FilteredTable, "Download .xlsx");
        download_button(ui, state, Artifact::FilteredCsv, "Download .csv");
    });
    ui.separator();

    let proportion_tables = [
        (
            state.raw_proportions.as_ref().map(|p| (p.to_table(), p.is_empty())),
            Artifact::RawProportions,
            "Raw proportions",
        ),
        (
            state.filtered_proportions.as_ref().map(|p| (p.to_table(), p.is_empty())),
            Artifact::FilteredProportions,
            "Filtered proportions",
        ),
    ];
    ui.columns(2, |columns: &mut [Ui]| {
        for (ui, (table, artifact, title)) in columns.iter_mut().zip(proportion_tables) {
            ui.strong(title);
            let Some((table, empty)) = table else {
                ui.weak(format!("column \"{}\" not found", state.config.outcome_column));
                continue;
            };
            table_view::preview(ui, title, &table, table.n_rows());
            if empty {
                ui.weak("No rows to count.");
            }
            download_button(ui, state, artifact, "Download .xlsx");
        }
    });
    ui.separator();

    plot::comparison_charts(ui, state);
}

fn download_button(ui: &mut Ui, state: &mut AppState, artifact: Artifact, text: &str) {
    if ui.button(text).clicked() {
        panels::save_file_dialog(state, artifact);
    }
}
