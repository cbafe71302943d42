use anyhow::{anyhow, Context, Result};
use log::warn;
use std::collections::BTreeMap;
use std::{fs, path::PathBuf, sync::RwLock};

use crate::audio::NoiseColor;
use crate::constants::{DEFAULT_VOLUME, MAX_TIMER_MINUTES};

pub const VOLUME_KEY: &str = "whiteNoise_volume";
pub const TIMER_KEY: &str = "whiteNoise_timer";
pub const NOISE_COLOR_KEY: &str = "whiteNoise_noiseType";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preferences {
    pub volume: f32,
    pub timer_minutes: u32,
    pub noise_color: NoiseColor,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            timer_minutes: 0,
            noise_color: NoiseColor::White,
        }
    }
}

/// Local key-value storage for the player's preferences.
///
/// Values are kept as strings, one key per preference, in a flat JSON object.
/// Anything unreadable falls back to the default for that key.
pub struct PreferencesStore {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
}

impl PreferencesStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read preferences from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring malformed preferences file {}: {}",
                    path.display(),
                    err
                );
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn preferences(&self) -> Preferences {
        let defaults = Preferences::default();
        let Ok(data) = self.data.read() else {
            return defaults;
        };

        Preferences {
            volume: data
                .get(VOLUME_KEY)
                .and_then(|raw| parse_volume(raw))
                .unwrap_or(defaults.volume),
            timer_minutes: data
                .get(TIMER_KEY)
                .and_then(|raw| parse_minutes(raw))
                .unwrap_or(defaults.timer_minutes),
            noise_color: data
                .get(NOISE_COLOR_KEY)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.noise_color),
        }
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.update(VOLUME_KEY, volume.to_string())
    }

    pub fn set_timer_minutes(&self, minutes: u32) -> Result<()> {
        self.update(TIMER_KEY, minutes.to_string())
    }

    pub fn set_noise_color(&self, color: NoiseColor) -> Result<()> {
        self.update(NOISE_COLOR_KEY, color.as_str().to_string())
    }

    fn update(&self, key: &str, value: String) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("preferences lock poisoned"))?;
        guard.insert(key.to_string(), value);
        self.persist(&guard)
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write preferences to {}", self.path.display()))
    }
}

fn parse_volume(raw: &str) -> Option<f32> {
    let value: f32 = raw.trim().parse().ok()?;
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

fn parse_minutes(raw: &str) -> Option<u32> {
    let value: i64 = raw.trim().parse().ok()?;
    Some(value.clamp(0, MAX_TIMER_MINUTES as i64) as u32)
}
