//! # Configuration
//!
//! Manages the loading and parsing of the agent's configuration file (`config.yaml`).
//! Defines the structs for access control, cache, rate limiting, aggregation and logging.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "data/config.yaml";

/// Main configuration structure.
/// Matches the layout of `data/config.yaml`; every field has a default.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Trigger prefix for command-style handlers
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    /// Registration ids that are never dispatched (e.g. "user/ping:ping")
    #[serde(default)]
    pub disabled_commands: Vec<String>,
    /// Chat receiving album and deletion reports
    #[serde(default)]
    pub log_chat_id: Option<i64>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            owner_id: None,
            admin_ids: Vec::new(),
            disabled_commands: Vec::new(),
            log_chat_id: None,
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            aggregation: AggregationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_prefix() -> String {
    ".".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            default_ttl_secs: default_cache_ttl(),
            max_entries: default_cache_entries(),
            redis_url: None,
        }
    }
}

fn default_cache_ttl() -> u64 {
    300
}
fn default_cache_entries() -> usize {
    4096
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// How long the "slow down" notice stays before the original text is restored
    #[serde(default = "default_notice_secs")]
    pub notice_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            notice_secs: default_notice_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn notice_delay(&self) -> Duration {
        Duration::from_secs(self.notice_secs)
    }
}

fn default_notice_secs() -> u64 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct AggregationConfig {
    #[serde(default = "default_window_ms")]
    pub album_quiet_ms: u64,
    #[serde(default = "default_window_ms")]
    pub delete_window_ms: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            album_quiet_ms: default_window_ms(),
            delete_window_ms: default_window_ms(),
        }
    }
}

impl AggregationConfig {
    pub fn album_quiet(&self) -> Duration {
        Duration::from_millis(self.album_quiet_ms)
    }

    pub fn delete_window(&self) -> Duration {
        Duration::from_millis(self.delete_window_ms)
    }
}

fn default_window_ms() -> u64 {
    2500
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Session log file name inside `data_dir`; `None` disables the file layer
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            data_dir: default_data_dir(),
            file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_data_dir() -> String {
    "data".to_string()
}
fn default_log_file() -> Option<String> {
    Some("session.log".to_string())
}

impl AppConfig {
    /// Parses a YAML document. An empty document yields the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Failed to parse config.yaml")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Resolves the config file: explicit path, then `data/config.yaml`, then
    /// `<config dir>/herald/config.yaml`. Falls back to defaults when none exists.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let candidates: Vec<PathBuf> = std::iter::once(PathBuf::from(DEFAULT_CONFIG_PATH))
            .chain(dirs::config_dir().map(|dir| dir.join("herald").join("config.yaml")))
            .collect();

        for candidate in candidates {
            if candidate.exists() {
                tracing::debug!("Loading configuration from {}", candidate.display());
                return Self::load(&candidate);
            }
        }

        Ok(Self::default())
    }

    /// Admin set used by `admin_only` handlers; the owner is always an admin.
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.owner_id == Some(user_id) || self.admin_ids.contains(&user_id)
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner_id == Some(user_id)
    }
}
