use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod defaults;

use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub avatars: AvatarConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for request bodies, e.g. "10MB". Must stay above the 1 MiB
    /// upload limit so oversized avatars reach the store and are rejected there.
    #[serde(default = "default_max_request_size")]
    pub max_request_size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory holding `original/`, size buckets, `default.png` and `recent.log`
    #[serde(default = "default_avatar_path")]
    pub avatar_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarConfig {
    /// Thumbnail size used when a request carries neither `s` nor `size`
    #[serde(default = "default_thumbnail_size")]
    pub default_size: u32,
    /// Number of recently uploaded avatars shown on the home page
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
    /// `Cache-Control` max-age for served thumbnails
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age: String,
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_request_size() -> String {
    DEFAULT_MAX_REQUEST_SIZE.to_string()
}

// Storage defaults
fn default_avatar_path() -> PathBuf {
    PathBuf::from(DEFAULT_AVATAR_PATH)
}

// Avatar defaults
fn default_thumbnail_size() -> u32 {
    DEFAULT_THUMBNAIL_SIZE
}

fn default_recent_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}

fn default_cache_max_age() -> String {
    DEFAULT_CACHE_MAX_AGE.to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_request_size: default_max_request_size(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            avatar_path: default_avatar_path(),
        }
    }
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            default_size: default_thumbnail_size(),
            recent_limit: default_recent_limit(),
            cache_max_age: default_cache_max_age(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            storage: StorageConfig::default(),
            avatars: AvatarConfig::default(),
        }
    }
}

impl WebConfig {
    /// Request body limit in bytes
    pub fn max_request_bytes(&self) -> Result<usize> {
        parse_byte_size(&self.max_request_size)
    }
}

impl AvatarConfig {
    /// Validate avatar settings against the engine invariants
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_THUMBNAIL_SIZE..=MAX_THUMBNAIL_SIZE).contains(&self.default_size) {
            return Err(format!(
                "default_size {} must be between {} and {}",
                self.default_size, MIN_THUMBNAIL_SIZE, MAX_THUMBNAIL_SIZE
            ));
        }
        if let Err(e) = humantime::parse_duration(&self.cache_max_age) {
            return Err(format!(
                "cache_max_age '{}' is not a valid duration: {}",
                self.cache_max_age, e
            ));
        }
        Ok(())
    }

    /// Parsed `Cache-Control` max-age
    pub fn cache_max_age(&self) -> Duration {
        humantime::parse_duration(&self.cache_max_age)
            .unwrap_or_else(|_| Duration::from_secs(86_400))
    }
}

/// Parse a human readable byte size such as "10MB", "512KB" or "1048576"
pub fn parse_byte_size(value: &str) -> Result<usize> {
    let trimmed = value.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    let amount: usize = digits
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid byte size: '{}'", value))?;

    let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" | "K" | "KIB" => 1024,
        "MB" | "M" | "MIB" => 1024 * 1024,
        "GB" | "G" | "GIB" => 1024 * 1024 * 1024,
        other => return Err(anyhow::anyhow!("Unknown byte size unit '{}' in '{}'", other, value)),
    };

    amount
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("Byte size overflows: '{}'", value))
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        let config = Self::load_from_file(&config_file)?;
        info!("Configuration loaded from: {}", config_file);
        Ok(config)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let config: Self = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            toml::from_str(&contents)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            default_config
        };

        config.avatars.validate().map_err(|e| anyhow::anyhow!(e))?;
        config.web.max_request_bytes()?;
        Ok(config)
    }
}
