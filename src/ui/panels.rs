use std::path::Path;

use anyhow::{Context, Result};
use eframe::egui::{self, Color32, RichText, ScrollArea, Slider, TextureHandle, Ui};

use crate::chart::ChartKind;
use crate::data::filter::ALL;
use crate::data::loader::ACCEPTED_EXTENSIONS;
use crate::state::{AppState, Artifact, StatusLevel};

// ---------------------------------------------------------------------------
// Left side panel – filter form
// ---------------------------------------------------------------------------

/// Render the left filter panel. Nothing takes effect until "Apply".
pub fn side_panel(ui: &mut Ui, state: &mut AppState, branding: Option<&TextureHandle>) {
    if let Some(texture) = branding {
        ui.vertical_centered(|ui: &mut Ui| {
            ui.add(
                egui::Image::from_texture(egui::load::SizedTexture::from_handle(texture))
                    .max_width(ui.available_width() * 0.8)
                    .max_height(120.0)
                    .corner_radius(4.0),
            );
        });
        ui.add_space(4.0);
    }

    ui.heading("Filters");
    ui.separator();

    if state.raw.is_none() {
        ui.label("No file loaded.");
        return;
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Chart kind ----
            ui.strong("Chart type");
            ui.horizontal(|ui: &mut Ui| {
                for kind in ChartKind::ALL {
                    ui.radio_value(&mut state.form.chart_kind, kind, kind.label());
                }
            });
            ui.separator();

            // ---- Range ----
            match &mut state.form.range {
                Some(range) => {
                    ui.strong(&range.label);
                    let mut min = range.min;
                    let mut max = range.max;
                    let mut min_slider = Slider::new(&mut min, range.lo..=range.hi).text("from");
                    let mut max_slider = Slider::new(&mut max, range.lo..=range.hi).text("to");
                    if range.integer {
                        min_slider = min_slider.integer();
                        max_slider = max_slider.integer();
                    }
                    if ui.add(min_slider).changed() {
                        range.set_min(min);
                    }
                    if ui.add(max_slider).changed() {
                        range.set_max(max);
                    }
                }
                None => {
                    ui.strong(&state.config.range_filter.label);
                    ui.weak("column unavailable");
                }
            }
            ui.separator();

            // ---- Multi-selects (collapsible) ----
            for sel in &mut state.form.categorical {
                let Some(options) = sel.options.clone() else {
                    ui.label(RichText::new(&sel.label).strong());
                    ui.weak(format!("column \"{}\" not found", sel.column));
                    continue;
                };

                let header_text = format!(
                    "{}  ({}/{})",
                    sel.label,
                    sel.selected.len(),
                    options.len()
                );
                egui::CollapsingHeader::new(RichText::new(header_text).strong())
                    .id_salt(&sel.column)
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        ui.horizontal(|ui: &mut Ui| {
                            if ui.small_button("All").clicked() {
                                sel.selected = vec![ALL.to_string()];
                            }
                            if ui.small_button("None").clicked() {
                                sel.selected.clear();
                            }
                        });
                        for option in &options {
                            let mut checked = sel.is_selected(option);
                            if ui.checkbox(&mut checked, option.as_str()).changed() {
                                sel.toggle(option);
                            }
                        }
                    });
            }

            ui.add_space(8.0);
            if ui.button("Apply").clicked() {
                state.apply();
            }

            ui.add_space(8.0);
            diagnostics(ui, state);
        });
}

/// Row counts after each stage of the last applied chain.
fn diagnostics(ui: &mut Ui, state: &AppState) {
    egui::CollapsingHeader::new("Diagnostics")
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            if let Some(raw) = state.raw_table() {
                ui.label(format!("input: {} rows", raw.n_rows()));
            }
            egui::Grid::new("stage_reports")
                .num_columns(2)
                .striped(true)
                .show(ui, |ui: &mut Ui| {
                    for stage in state.stages() {
                        ui.label(&stage.column);
                        match &stage.skipped {
                            None => ui.label(format!("{} rows", stage.rows)),
                            Some(e) => ui.label(
                                RichText::new(format!("skipped: {e}")).color(Color32::YELLOW),
                            ),
                        };
                        ui.end_row();
                    }
                });
            let (hits, misses) = state.cache_stats();
            ui.weak(format!("cache: {hits} hits, {misses} misses"));
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let (Some(name), Some(raw), Some(filtered)) =
            (&state.source_name, state.raw_table(), state.filtered_table())
        {
            ui.label(format!(
                "{name}: {} rows loaded, {} after filters",
                raw.n_rows(),
                filtered.n_rows()
            ));
        }
    });
}

/// Render every current status message, coloured by level.
pub fn status_bar(ui: &mut Ui, state: &AppState) {
    for message in state.messages() {
        let color = match message.level {
            StatusLevel::Info => Color32::LIGHT_GREEN,
            StatusLevel::Warning => Color32::YELLOW,
            StatusLevel::Error => Color32::RED,
        };
        ui.label(RichText::new(&message.text).color(color));
    }
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open telemarketing data")
        .add_filter("Supported files", &ACCEPTED_EXTENSIONS)
        .add_filter("CSV", &["csv"])
        .add_filter("Excel", &["xlsx"])
        .pick_file();

    if let Some(path) = file {
        state.open_path(&path);
    }
}

/// Ask where to save `artifact`, suggesting its configured file name.
pub fn save_file_dialog(state: &mut AppState, artifact: Artifact) {
    let (file_name, extension) = {
        let names = &state.config.exports;
        match artifact {
            Artifact::FilteredTable => (&names.filtered, "xlsx"),
            Artifact::FilteredCsv => (&names.filtered_csv, "csv"),
            Artifact::RawProportions => (&names.raw_proportions, "xlsx"),
            Artifact::FilteredProportions => (&names.filtered_proportions, "xlsx"),
        }
    };
    let file = rfd::FileDialog::new()
        .set_title("Save")
        .set_file_name(file_name.as_str())
        .add_filter(extension, &[extension])
        .save_file();

    if let Some(path) = file {
        state.save(artifact, &path);
    }
}

// ---------------------------------------------------------------------------
// Branding image
// ---------------------------------------------------------------------------

/// Decode an image file into a texture for the side panel.
pub fn load_branding(ctx: &egui::Context, path: &Path) -> Result<TextureHandle> {
    let image = image::open(path)
        .with_context(|| format!("opening branding image {}", path.display()))?
        .to_rgba8();
    let size = [image.width() as usize, image.height() as usize];
    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw());
    Ok(ctx.load_texture("branding", color_image, egui::TextureOptions::LINEAR))
}
