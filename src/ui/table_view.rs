use eframe::egui::{self, Align, Layout, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::model::Table;

const ROW_HEIGHT: f32 = 18.0;

/// Render the first `rows` rows of `table` with a leading row-index column.
pub fn preview(ui: &mut Ui, id: &str, table: &Table, rows: usize) {
    ui.label(
        egui::RichText::new(format!("{} rows × {} columns", table.n_rows(), table.n_cols())).weak(),
    );
    if table.n_cols() == 0 {
        return;
    }

    let head = table.head(rows);
    ui.push_id(id, |ui: &mut Ui| {
        egui::ScrollArea::horizontal()
            .id_salt(id)
            .show(ui, |ui: &mut Ui| {
                TableBuilder::new(ui)
                    .striped(true)
                    .resizable(true)
                    .vscroll(false)
                    .cell_layout(Layout::left_to_right(Align::Center))
                    .column(Column::auto())
                    .columns(Column::auto().at_least(60.0), head.n_cols())
                    .header(ROW_HEIGHT + 2.0, |mut header| {
                        header.col(|ui: &mut Ui| {
                            ui.strong("#");
                        });
                        for name in head.column_names() {
                            header.col(|ui: &mut Ui| {
                                ui.strong(name);
                            });
                        }
                    })
                    .body(|body| {
                        body.rows(ROW_HEIGHT, head.n_rows(), |mut row| {
                            let r = row.index();
                            row.col(|ui: &mut Ui| {
                                ui.label(r.to_string());
                            });
                            for c in 0..head.n_cols() {
                                row.col(|ui: &mut Ui| {
                                    if let Some(value) = head.cell(r, c) {
                                        ui.label(value.to_field());
                                    }
                                });
                            }
                        });
                    });
            });
    });
}
