//! Configuration loading and parsing

use crate::influx::WriteOptions;
use crate::point::TimePolicy;
use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub dbc: DbcConfig,
    pub influx: InfluxConfig,
    #[serde(default)]
    pub writer: WriterConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Read timeout; an expired read counts as an empty poll
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum bytes requested per read
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DbcConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InfluxConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    #[serde(default)]
    pub token: String,
    /// Write a `smoke_test` point at startup
    #[serde(default = "default_true")]
    pub smoke_test: bool,
    /// `host` tag of the smoke test point
    #[serde(default = "default_smoke_test_host")]
    pub smoke_test_host: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WriterConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_exponential_base")]
    pub exponential_base: u32,
    #[serde(default = "default_true")]
    pub gzip: bool,
    /// Stamp points with the wall clock instead of the CAN timestamp
    #[serde(default = "default_true")]
    pub use_now_time: bool,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            jitter_ms: default_jitter_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            max_retries: default_max_retries(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            exponential_base: default_exponential_base(),
            gzip: true,
            use_now_time: true,
            heartbeat_ms: default_heartbeat_ms(),
        }
    }
}

impl WriterConfig {
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            batch_size: self.batch_size,
            flush_interval_ms: self.flush_interval_ms,
            jitter_ms: self.jitter_ms,
            retry_interval_ms: self.retry_interval_ms,
            max_retries: self.max_retries,
            max_retry_delay_ms: self.max_retry_delay_ms,
            exponential_base: self.exponential_base,
            gzip: self.gzip,
        }
    }

    pub fn time_policy(&self) -> TimePolicy {
        if self.use_now_time {
            TimePolicy::WallClock
        } else {
            TimePolicy::CanTimestamp
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    230_400
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_chunk_size() -> usize {
    24 * 21
}

fn default_smoke_test_host() -> String {
    "raspi".to_string()
}

fn default_batch_size() -> usize {
    1000
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_jitter_ms() -> u64 {
    100
}

fn default_retry_interval_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    5
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_exponential_base() -> u32 {
    2
}

fn default_heartbeat_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Apply command line overrides on top of the file values
    pub fn apply_overrides(&mut self, port: Option<String>, baud_rate: Option<u32>, dbc: Vec<PathBuf>) {
        if let Some(port) = port {
            self.serial.port = port;
        }
        if let Some(baud_rate) = baud_rate {
            self.serial.baud_rate = baud_rate;
        }
        if !dbc.is_empty() {
            self.dbc.files = dbc;
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.dbc.files.is_empty() {
            bail!("No DBC file configured (set [dbc] files or pass --dbc)");
        }
        ensure!(!self.influx.url.is_empty(), "influx.url must not be empty");
        ensure!(self.serial.chunk_size > 0, "serial.chunk_size must be greater than zero");
        ensure!(self.writer.batch_size > 0, "writer.batch_size must be greater than zero");
        ensure!(
            self.writer.exponential_base >= 1,
            "writer.exponential_base must be at least 1"
        );
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
