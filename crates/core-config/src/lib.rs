//! Configuration loading and parsing.
//!
//! Parses `ttyblocks.toml` (or an override path provided by the binary):
//!
//! ```toml
//! [paint]
//! interval_ms = 50
//! mode = "delta"
//! [block]
//! default_view = 10
//! [tick]
//! interval_ms = 100
//! ```
//!
//! The raw parsed values are kept as written; `Config::effective` clamps them
//! into the ranges the engine accepts and logs each adjustment. Unknown fields
//! are ignored, and a missing or malformed file yields defaults.

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "ttyblocks.toml";

const PAINT_INTERVAL_MS: (u64, u64) = (10, 1000);
const TICK_INTERVAL_MS: (u64, u64) = (10, 5000);

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RepaintModeConfig {
    Full,
    #[default]
    Delta,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaintConfig {
    #[serde(default = "PaintConfig::default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub mode: RepaintModeConfig,
}

impl Default for PaintConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
            mode: RepaintModeConfig::default(),
        }
    }
}

impl PaintConfig {
    const fn default_interval_ms() -> u64 {
        50
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlockConfig {
    #[serde(default = "BlockConfig::default_view")]
    pub default_view: usize,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            default_view: Self::default_view(),
        }
    }
}

impl BlockConfig {
    const fn default_view() -> usize {
        10
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TickConfig {
    #[serde(default = "TickConfig::default_interval_ms")] // matches the indicator refresh rate
    pub interval_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
        }
    }
}

impl TickConfig {
    const fn default_interval_ms() -> u64 {
        100
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub paint: PaintConfig,
    #[serde(default)]
    pub block: BlockConfig,
    #[serde(default)]
    pub tick: TickConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub path: Option<PathBuf>,
    pub file: ConfigFile, // parsed (or default) data
}

/// Values after clamping, ready to hand to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub paint_interval: Duration,
    pub mode: RepaintModeConfig,
    pub default_view: usize,
    pub tick_interval: Duration,
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("ttyblocks").join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                raw: Some(content),
                path: Some(path),
                file,
            })
        }
        Err(err) => {
            warn!(target: "config", path = %path.display(), %err, "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

fn clamp_logged(field: &'static str, raw: u64, (min, max): (u64, u64)) -> u64 {
    let clamped = raw.clamp(min, max);
    if clamped != raw {
        info!(target: "config", field, raw, clamped, min, max, "config_value_clamped");
    }
    clamped
}

impl Config {
    /// Clamp the parsed values into accepted ranges, logging every change.
    pub fn effective(&self) -> EffectiveConfig {
        let paint_ms = clamp_logged(
            "paint.interval_ms",
            self.file.paint.interval_ms,
            PAINT_INTERVAL_MS,
        );
        let tick_ms = clamp_logged(
            "tick.interval_ms",
            self.file.tick.interval_ms,
            TICK_INTERVAL_MS,
        );
        let raw_view = self.file.block.default_view;
        let default_view = raw_view.max(1);
        if default_view != raw_view {
            info!(
                target: "config",
                field = "block.default_view",
                raw = raw_view,
                clamped = default_view,
                "config_value_clamped"
            );
        }
        EffectiveConfig {
            paint_interval: Duration::from_millis(paint_ms),
            mode: self.file.paint.mode,
            default_view,
            tick_interval: Duration::from_millis(tick_ms),
        }
    }
}
