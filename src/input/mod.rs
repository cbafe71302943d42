pub mod gesture;
pub mod keys;

pub use gesture::{DragGesture, DragUpdate};
pub use keys::{map_key, ControlAction, Key, KeyContext};

use serde::Serialize;
use std::fmt;

use crate::audio::NoiseColor;

/// Transient text shown while a control is being adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Readout {
    Volume { volume: f32 },
    Timer { minutes: u32 },
    Noise { color: NoiseColor },
}

impl fmt::Display for Readout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readout::Volume { volume } => write!(f, "Volume {}%", (volume * 100.0).round() as i32),
            Readout::Timer { minutes: 0 } => f.write_str("Timer Off"),
            Readout::Timer { minutes } => write!(f, "{minutes} min"),
            Readout::Noise { color } => f.write_str(color.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readout_texts() {
        assert_eq!(Readout::Volume { volume: 0.754 }.to_string(), "Volume 75%");
        assert_eq!(Readout::Volume { volume: 1.0 }.to_string(), "Volume 100%");
        assert_eq!(Readout::Timer { minutes: 0 }.to_string(), "Timer Off");
        assert_eq!(Readout::Timer { minutes: 25 }.to_string(), "25 min");
        assert_eq!(
            Readout::Noise {
                color: NoiseColor::Brown
            }
            .to_string(),
            "Brown Noise"
        );
    }
}
