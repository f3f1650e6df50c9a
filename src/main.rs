mod app;
mod auth;
mod config;
mod data;
mod page;
mod state;
mod ui;

use app::RustySiftApp;
use auth::AuthContext;
use config::AppConfig;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = AppConfig::load();
    let auth = AuthContext::from_env();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(config.window_size)
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty Sift – SQL Automation For Client Analysis",
        options,
        Box::new(move |_cc| Ok(Box::new(RustySiftApp::new(config, &auth)))),
    )
}
