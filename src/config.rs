use crate::error::ExporterError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// When snapshots are collected.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Collect synchronously on every scrape (staleness 0)
    #[default]
    OnScrape,
    /// Serve the cached snapshot, refreshed in the background
    /// (staleness bounded by `refresh_interval_seconds`)
    Interval,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectorConfig {
    #[serde(default)]
    pub refresh_mode: RefreshMode,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
    #[serde(default = "default_collection_timeout")]
    pub collection_timeout_seconds: u64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
    #[serde(default = "default_kstat_root")]
    pub kstat_root: String,
}

fn default_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9901
}

fn default_refresh_interval() -> u64 {
    15
}

fn default_collection_timeout() -> u64 {
    30
}

fn default_command_timeout() -> u64 {
    10
}

fn default_kstat_root() -> String {
    "/proc/spl/kstat/zfs".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            port: default_port(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            refresh_mode: RefreshMode::default(),
            refresh_interval_seconds: default_refresh_interval(),
            collection_timeout_seconds: default_collection_timeout(),
            command_timeout_seconds: default_command_timeout(),
            kstat_root: default_kstat_root(),
        }
    }
}

impl CollectorConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds.max(1))
    }

    pub fn collection_timeout(&self) -> Duration {
        Duration::from_secs(self.collection_timeout_seconds.max(1))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds.max(1))
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ZFS_EXPORTER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the exporter cannot run with
    pub fn validate(&self) -> std::result::Result<(), ExporterError> {
        if self.server.addr.trim().is_empty() {
            return Err(ExporterError::Config("server.addr must not be empty".to_string()));
        }
        if self.collector.kstat_root.trim().is_empty() {
            return Err(ExporterError::Config(
                "collector.kstat_root must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Socket address string the server binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.addr, self.server.port)
    }
}
