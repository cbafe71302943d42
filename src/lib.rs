pub mod audio;
pub mod config;
pub mod constants;
pub mod input;
pub mod player;
pub mod settings;
pub mod terminal;
pub mod timer;
pub mod utils;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
pub(crate) struct AppState {
    pub(crate) player: player::PlayerService,
}

#[cfg(feature = "desktop")]
mod desktop {
    use std::sync::Arc;

    use tauri::Manager;
    use tokio::sync::mpsc::unbounded_channel;

    use crate::audio::RodioOutput;
    use crate::config::{self, AppConfig};
    use crate::player::{
        commands::{
            drag_end, drag_move, drag_start, get_player_state, key_pressed, set_noise_color,
            set_timer_minutes, set_volume, toggle_noise_color, toggle_play,
        },
        events::TauriEvents,
        PlayerController, PlayerService,
    };
    use crate::settings::PreferencesStore;
    use crate::AppState;

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        let app_config = AppConfig::from_env();
        config::init_logging(&app_config);

        log::info!("noisenow starting up...");

        tauri::Builder::default()
            .plugin(tauri_plugin_opener::init())
            .setup(move |app| {
                let result = (|| -> anyhow::Result<()> {
                    app_config.ensure_data_dir()?;
                    let store = PreferencesStore::new(app_config.preferences_path())?;

                    let (status_tx, status_rx) = unbounded_channel();
                    let output = RodioOutput::new(Some(status_tx));
                    let controller = PlayerController::with_store(store, Box::new(output));
                    let events = TauriEvents::new(app.handle().clone());
                    let player = PlayerService::new(controller, Arc::new(events));

                    // Spawned inside the shared runtime so the task outlives setup.
                    let listener = player.clone();
                    tauri::async_runtime::block_on(async move {
                        listener.listen_for_status(status_rx);
                    });

                    app.manage(AppState { player });
                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                get_player_state,
                toggle_play,
                set_volume,
                set_noise_color,
                toggle_noise_color,
                set_timer_minutes,
                key_pressed,
                drag_start,
                drag_move,
                drag_end,
            ])
            .build(tauri::generate_context!())
            .expect("error while building tauri application")
            .run(|app_handle, event| {
                if let tauri::RunEvent::Exit = event {
                    if let Some(state) = app_handle.try_state::<AppState>() {
                        let player = state.player.clone();
                        tauri::async_runtime::block_on(player.shutdown());
                    }
                }
            });
    }
}
