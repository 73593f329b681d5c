//! # Client Configuration
//!
//! TOML configuration for the `mwsync` binary. Every section and field has a
//! default, so a partial file (or an empty one) is valid.
//!
//! ```toml
//! [client]
//! game_config = "game.json"
//! world = "world.json"
//! slot = "Player1"
//!
//! [sync]
//! init_timeout_ms = 10000
//! poll_interval_ms = 100
//! flush_debounce_ticks = 35
//! data_dir = "./data"
//!
//! [tick]
//! ticks_per_second = 30
//!
//! [logging]
//! level = "info"
//! file = "mwsync.log"
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mwsync::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("slot: {}", config.client.slot);
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::sync::SyncOptions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub tick: TickConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Static game configuration (locations and item catalog).
    #[serde(default = "default_game_config")]
    pub game_config: String,
    /// Local world file used by `play`.
    #[serde(default = "default_world")]
    pub world: String,
    /// Slot name; namespaces the private save keys.
    #[serde(default = "default_slot")]
    pub slot: String,
}

fn default_game_config() -> String {
    "game.json".to_string()
}

fn default_world() -> String {
    "world.json".to_string()
}

fn default_slot() -> String {
    "Player1".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            game_config: default_game_config(),
            world: default_world(),
            slot: default_slot(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_init_timeout_ms")]
    pub init_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_flush_debounce_ticks")]
    pub flush_debounce_ticks: u32,
    /// Directory of the local sled save store.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_init_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_flush_debounce_ticks() -> u32 {
    35
}

fn default_data_dir() -> String {
    "./data".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            init_timeout_ms: default_init_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            flush_debounce_ticks: default_flush_debounce_ticks(),
            data_dir: default_data_dir(),
        }
    }
}

impl SyncConfig {
    /// Session sync options. A zero poll interval would spin, so it is raised to 1ms.
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            init_timeout: Duration::from_millis(self.init_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            flush_debounce_ticks: self.flush_debounce_ticks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfig {
    #[serde(default = "default_ticks_per_second")]
    pub ticks_per_second: u32,
}

fn default_ticks_per_second() -> u32 {
    30
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: default_ticks_per_second(),
        }
    }
}

impl TickConfig {
    pub fn period(&self) -> Duration {
        let tps = match self.ticks_per_second {
            0 => {
                eprintln!("Invalid ticks_per_second 0, defaulting to 30");
                default_ticks_per_second()
            }
            n => n.min(1000),
        };
        Duration::from_micros(1_000_000 / u64::from(tps))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: Some("mwsync.log".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}
