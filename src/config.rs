use anyhow::{Context, Result};
use clap::Parser;
use std::{
    env,
    fs::{self, OpenOptions},
    path::PathBuf,
};

use crate::audio::NoiseColor;

pub const DATA_DIR_ENV: &str = "NOISENOW_DATA_DIR";
pub const DEBUG_ENV: &str = "NOISENOW_DEBUG";

const APP_DIR_NAME: &str = "noisenow";
const FALLBACK_DIR_NAME: &str = ".noisenow";
const PREFERENCES_FILE: &str = "preferences.json";
const LOG_FILE: &str = "noisenow.log";

/// Ambient brown/white noise with a fade-out sleep timer
#[derive(Parser, Debug, Default)]
#[command(name = "noisenow", version, long_about = None)]
pub struct Cli {
    /// Directory for preferences and the log file
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Noise colour to use: brown or white
    #[arg(long, value_name = "COLOR")]
    pub color: Option<NoiseColor>,

    /// Volume between 0.0 and 1.0
    #[arg(long, value_name = "LEVEL")]
    pub volume: Option<f32>,

    /// Sleep timer in minutes (0 turns it off)
    #[arg(long, value_name = "MINUTES")]
    pub minutes: Option<u32>,

    /// Start playing immediately
    #[arg(long)]
    pub play: bool,

    /// Log at debug level
    #[arg(long)]
    pub debug: bool,
}

/// Resolved runtime settings shared by the terminal and desktop front ends.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub debug: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::resolve(None, false)
    }

    pub fn from_cli(cli: &Cli) -> Self {
        Self::resolve(cli.data_dir.clone(), cli.debug)
    }

    fn resolve(data_dir: Option<PathBuf>, debug: bool) -> Self {
        let data_dir = data_dir
            .or_else(|| env::var_os(DATA_DIR_ENV).map(PathBuf::from))
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME)))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_DIR_NAME));

        Self {
            data_dir,
            debug: debug || env_flag(DEBUG_ENV),
        }
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join(PREFERENCES_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }

    pub fn ensure_data_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("Failed to create {}", self.data_dir.display()))
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|value| parse_flag(&value))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Logs to stderr, filtered by `RUST_LOG` on top of the configured level.
pub fn init_logging(config: &AppConfig) {
    env_logger::Builder::new()
        .filter_level(config.log_level())
        .parse_default_env()
        .init();
}

/// Logs to `<data dir>/noisenow.log` so a raw-mode screen stays clean.
pub fn init_file_logging(config: &AppConfig) -> Result<()> {
    config.ensure_data_dir()?;
    let path = config.log_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    env_logger::Builder::new()
        .filter_level(config.log_level())
        .parse_default_env()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}
