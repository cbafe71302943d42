#[cfg(feature = "desktop")]
pub mod commands;
pub mod controller;
pub mod events;
pub mod service;

pub use controller::PlayerController;
pub use events::{PlaybackState, PlayerEvent, PlayerEvents};
pub use service::PlayerService;
