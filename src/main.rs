use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

use noisenow_lib::{
    audio::RodioOutput,
    config::{self, AppConfig, Cli},
    player::{PlayerController, PlayerService},
    settings::PreferencesStore,
    terminal,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app_config = AppConfig::from_cli(&cli);
    config::init_file_logging(&app_config)?;
    info!("noisenow starting, data in {}", app_config.data_dir.display());

    let store = PreferencesStore::new(app_config.preferences_path())?;
    let (status_tx, status_rx) = unbounded_channel();
    let output = RodioOutput::new(Some(status_tx));
    let controller = PlayerController::with_store(store, Box::new(output));

    let (event_tx, event_rx) = unbounded_channel();
    let service = PlayerService::new(controller, Arc::new(event_tx));
    let listener = service.listen_for_status(status_rx);

    apply_overrides(&service, &cli).await;
    let result = terminal::run(service.clone(), event_rx).await;

    service.shutdown().await;
    listener.abort();
    info!("noisenow stopped");
    result
}

/// Flags behave like the user making the change, so they are remembered.
async fn apply_overrides(service: &PlayerService, cli: &Cli) {
    if let Some(color) = cli.color {
        service.set_noise_color(color).await;
    }
    if let Some(volume) = cli.volume {
        service.set_volume(volume).await;
    }
    if let Some(minutes) = cli.minutes {
        service.set_timer_minutes(minutes).await;
    }
    if cli.play {
        if let Err(err) = service.toggle_play().await {
            warn!("Could not start playback: {:#}", err);
        }
    }
}
