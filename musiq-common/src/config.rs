//! Configuration loading and cache folder resolution
//!
//! Bootstrap configuration comes from a single TOML file. Everything in it is
//! optional: a missing file logs a warning and the built-in defaults are used,
//! so the player always starts. A file that exists but does not parse is an
//! error, since silently ignoring it would hide typos.
//!
//! # Settings Sources Priority (cache folder)
//!
//! 1. Command-line argument (`--cache-dir`)
//! 2. Environment variable (`MUSIQ_CACHE_DIR`)
//! 3. TOML configuration file (`cache_dir`)
//! 4. OS-dependent default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the audio cache folder
pub const CACHE_DIR_ENV: &str = "MUSIQ_CACHE_DIR";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Folder holding downloaded audio, keyed by canonical track URL
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Queue orchestration bounds
    #[serde(default)]
    pub queue: QueueSettings,

    /// Audio output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Audio output configuration
///
/// `command` is an argv prefix; the cached audio file path is appended as the
/// last argument. Without a command the player runs silently, holding each
/// track for its duration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub command: Option<Vec<String>>,
}

/// How the next current song is picked from the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PopPolicy {
    /// The earliest visible entry must be confirmed before anything plays;
    /// a slow download at the head holds back later, already confirmed entries.
    #[default]
    HeadOfLine,
    /// The earliest confirmed entry plays, passing over entries still downloading.
    FirstConfirmed,
}

/// Queue orchestration bounds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueueSettings {
    /// Upper bound on entries created by one playlist import
    #[serde(default = "default_max_playlist_items")]
    pub max_playlist_items: usize,

    /// Tracks requested by an explicit radio request
    #[serde(default = "default_radio_fill_count")]
    pub radio_fill_count: usize,

    /// Tracks requested when autoplay refills an empty queue
    #[serde(default = "default_autoplay_fill_count")]
    pub autoplay_fill_count: usize,

    /// Simultaneous in-flight downloads
    #[serde(default = "default_download_workers")]
    pub download_workers: usize,

    /// Extra attempts after a failed audio download
    #[serde(default = "default_download_retries")]
    pub download_retries: u32,

    #[serde(default)]
    pub pop_policy: PopPolicy,

    /// Upper bound on how long a skip waits for the autoplay refill request
    #[serde(default = "default_refill_wait_ms")]
    pub refill_wait_ms: u64,
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_playlist_items() -> usize {
    10
}

fn default_radio_fill_count() -> usize {
    5
}

fn default_autoplay_fill_count() -> usize {
    1
}

fn default_download_workers() -> usize {
    4
}

fn default_download_retries() -> u32 {
    2
}

fn default_refill_wait_ms() -> u64 {
    5000
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_playlist_items: default_max_playlist_items(),
            radio_fill_count: default_radio_fill_count(),
            autoplay_fill_count: default_autoplay_fill_count(),
            download_workers: default_download_workers(),
            download_retries: default_download_retries(),
            pop_policy: PopPolicy::default(),
            refill_wait_ms: default_refill_wait_ms(),
        }
    }
}

impl QueueSettings {
    /// Reject bounds that would make the queue unusable
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_playlist_items", self.max_playlist_items),
            ("radio_fill_count", self.radio_fill_count),
            ("autoplay_fill_count", self.autoplay_fill_count),
            ("download_workers", self.download_workers),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::Config(format!("queue.{} must be positive", name)));
            }
        }
        Ok(())
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cache_dir: None,
            logging: LoggingConfig::default(),
            queue: QueueSettings::default(),
            output: OutputConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.queue.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when absent
    ///
    /// With no explicit path the platform default location is tried
    /// (see [`default_config_path`]).
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => path,
            None => {
                warn!("No configuration directory on this platform, using defaults");
                return Ok(Self::default());
            }
        };

        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Default configuration file path (`<config dir>/musiq/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("musiq").join("config.toml"))
}

/// Resolves the audio cache folder from the configured sources
#[derive(Debug, Clone)]
pub struct CacheDirResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl CacheDirResolver {
    pub fn new(cli_arg: Option<PathBuf>, config: &TomlConfig) -> Self {
        Self {
            cli_arg,
            toml_value: config.cache_dir.clone(),
        }
    }

    /// Resolve following the documented priority order
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(CACHE_DIR_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        default_cache_dir()
    }
}

/// OS-dependent default cache folder
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("musiq").join("songs"))
        .unwrap_or_else(|| PathBuf::from("./musiq_cache/songs"))
}
