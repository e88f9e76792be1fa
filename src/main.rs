#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod action;
mod config;
mod gesture;
mod model_download;
mod pipeline;
mod types;
mod ui;

use anyhow::Result;
use crossbeam_channel::bounded;
use gpui::Application;

use config::AppConfig;
use pipeline::RecognizerBackend;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().unwrap_or_else(|err| {
        log::warn!("invalid configuration, using defaults: {err}");
        AppConfig::default()
    });
    log::info!(
        "models in {}, cooldown {:?}, min hand confidence {}",
        config.model_dir.display(),
        config.cooldown,
        config.min_hand_confidence
    );

    // Both consumers hold at most one pending frame; the camera drops the rest.
    let (display_tx, display_rx) = bounded(1);
    let (recognizer_tx, recognizer_rx) = bounded(1);
    let backend = RecognizerBackend::from_config(&config);

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(
                app,
                display_tx,
                display_rx,
                recognizer_tx,
                recognizer_rx,
                backend,
            ) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
