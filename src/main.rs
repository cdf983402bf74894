mod app;
mod cache;
mod chart;
mod color;
mod config;
mod data;
mod state;
mod ui;

use std::path::PathBuf;

use app::TelemarketingApp;
use config::AppConfig;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let (config, config_error) = AppConfig::resolve(std::env::args().nth(1).map(PathBuf::from));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Telemarketing Analysis",
        options,
        Box::new(|cc| {
            Ok(Box::new(TelemarketingApp::new(
                &cc.egui_ctx,
                config,
                config_error,
            )))
        }),
    )
}
