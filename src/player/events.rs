use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::audio::NoiseColor;
use crate::input::Readout;
use crate::timer::TimerStatus;

/// Everything a front end needs to draw the player.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub volume: f32,
    pub noise_color: NoiseColor,
    pub timer_minutes: u32,
    pub seconds_remaining: u32,
    pub timer_status: TimerStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PlayerEvent {
    StateChanged { state: PlaybackState },
    Readout { text: String, readout: Readout },
}

impl PlayerEvent {
    pub fn readout(readout: Readout) -> Self {
        PlayerEvent::Readout {
            text: readout.to_string(),
            readout,
        }
    }
}

/// Where the player publishes state changes and readouts.
pub trait PlayerEvents: Send + Sync {
    fn emit(&self, event: PlayerEvent);
}

impl PlayerEvents for UnboundedSender<PlayerEvent> {
    fn emit(&self, event: PlayerEvent) {
        // A closed receiver just means nobody is drawing any more.
        let _ = self.send(event);
    }
}

#[cfg(feature = "desktop")]
pub use desktop::TauriEvents;

#[cfg(feature = "desktop")]
mod desktop {
    use super::*;
    use tauri::{AppHandle, Emitter};

    #[derive(Serialize, Clone)]
    struct ReadoutEvent {
        text: String,
        readout: Readout,
    }

    pub struct TauriEvents {
        app_handle: AppHandle,
    }

    impl TauriEvents {
        pub fn new(app_handle: AppHandle) -> Self {
            Self { app_handle }
        }
    }

    impl PlayerEvents for TauriEvents {
        fn emit(&self, event: PlayerEvent) {
            let result = match event {
                PlayerEvent::StateChanged { state } => {
                    self.app_handle.emit("player-state-changed", state)
                }
                PlayerEvent::Readout { text, readout } => self
                    .app_handle
                    .emit("player-readout", ReadoutEvent { text, readout }),
            };
            if let Err(err) = result {
                log::warn!("Failed to emit player event: {}", err);
            }
        }
    }
}
