use std::f64::consts::TAU;

use eframe::egui::{Align2, Color32, Stroke, Ui};
use egui_plot::{Bar, BarChart, Legend, Plot, PlotPoint, PlotPoints, Polygon, Text};

use crate::chart::{ChartKind, ChartModel};
use crate::state::AppState;

const CHART_HEIGHT: f32 = 280.0;

// ---------------------------------------------------------------------------
// Raw vs filtered charts (central panel)
// ---------------------------------------------------------------------------

/// Render the raw and filtered charts side by side.
pub fn comparison_charts(ui: &mut Ui, state: &AppState) {
    let charts = state.charts();
    if charts.is_empty() {
        ui.label(format!(
            "No \"{}\" column to chart.",
            state.config.outcome_column
        ));
        return;
    }

    ui.columns(charts.len(), |columns: &mut [Ui]| {
        for (ui, chart) in columns.iter_mut().zip(&charts) {
            ui.heading(&chart.title);
            if chart.slices.is_empty() {
                ui.label("No rows to chart.");
                continue;
            }
            match chart.kind {
                ChartKind::Bar => bar_chart(ui, chart),
                ChartKind::Pie => pie_chart(ui, chart),
            }
        }
    });
}

fn bar_chart(ui: &mut Ui, chart: &ChartModel) {
    let top = chart.max_percent();

    let bars: Vec<Bar> = chart
        .slices
        .iter()
        .enumerate()
        .map(|(i, s)| {
            Bar::new(i as f64, s.percent)
                .name(&s.label)
                .fill(s.color)
                .width(0.6)
        })
        .collect();

    Plot::new(format!("bar_{}", chart.title))
        .height(CHART_HEIGHT)
        .include_y(0.0)
        .include_y(top * 1.15)
        .include_x(-0.6)
        .include_x(chart.slices.len() as f64 - 0.4)
        .show_axes([false, true])
        .y_axis_label("%")
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars));
            for (i, s) in chart.slices.iter().enumerate() {
                let x = i as f64;
                plot_ui.text(
                    Text::new(PlotPoint::new(x, s.percent + top * 0.02), s.text.as_str())
                        .anchor(Align2::CENTER_BOTTOM),
                );
                plot_ui.text(
                    Text::new(PlotPoint::new(x, -top * 0.02), s.label.as_str())
                        .anchor(Align2::CENTER_TOP)
                        .color(s.color),
                );
            }
        });
}

fn pie_chart(ui: &mut Ui, chart: &ChartModel) {
    const RADIUS: f64 = 1.0;

    Plot::new(format!("pie_{}", chart.title))
        .height(CHART_HEIGHT)
        .data_aspect(1.0)
        .include_x(-1.1 * RADIUS)
        .include_x(1.1 * RADIUS)
        .include_y(-1.1 * RADIUS)
        .include_y(1.1 * RADIUS)
        .show_axes(false)
        .show_grid(false)
        .legend(Legend::default())
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .show(ui, |plot_ui| {
            for (slice, wedge) in chart.slices.iter().zip(chart.wedges()) {
                for piece in wedge.split(TAU / 4.0) {
                    let outline: PlotPoints = piece.outline(RADIUS).into();
                    plot_ui.polygon(
                        Polygon::new(outline)
                            .fill_color(slice.color)
                            .stroke(Stroke::new(1.0, slice.color))
                            .name(&slice.label),
                    );
                }
                let [x, y] = wedge.label_anchor(RADIUS);
                plot_ui.text(
                    Text::new(PlotPoint::new(x, y), slice.text.as_str()).color(Color32::WHITE),
                );
            }
        });
}
