//! Configuration management for freebie.
//!
//! Configuration is read from `~/.config/freebie/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

pub mod providers;

pub use providers::ProvidersConfig;

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::store::sqlite::DEFAULT_TRANSIENT_TTL;

pub const ITAD_KEY_ENV: &str = "ITAD_API_KEY";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub feed: FeedConfig,
    pub providers: ProvidersConfig,
    pub daemon: DaemonSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
    /// Lifetime of non-permanent cache rows.
    pub transient_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            transient_ttl_secs: DEFAULT_TRANSIENT_TTL.as_secs(),
        }
    }
}

impl StorageConfig {
    pub fn transient_ttl(&self) -> Duration {
        Duration::from_secs(self.transient_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub subreddit: String,
    pub limit: usize,
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            subreddit: crate::fetcher::reddit::DEFAULT_SUBREDDIT.to_string(),
            limit: 25,
            max_retries: 3,
            base_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonSection {
    /// Interval such as "30m", "1h" or "90s".
    pub interval: String,
    pub scan_on_start: bool,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            interval: "30m".to_string(),
            scan_on_start: true,
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            let mut config = Self::default();
            config.apply_env();
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load an explicit config file; it must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config = Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.apply_env();

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn apply_env(&mut self) {
        self.override_itad_key(std::env::var(ITAD_KEY_ENV).ok());
    }

    /// A non-blank environment value wins over the file.
    pub fn override_itad_key(&mut self, value: Option<String>) {
        if let Some(key) = value.filter(|k| !k.trim().is_empty()) {
            self.providers.itad_api_key = Some(key);
        }
    }

    /// Get the default config file path: `~/.config/freebie/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("freebie").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# freebie configuration
#
# Rates are requests per second for each storefront; 0 disables the limit.
# Intervals accept a number with an optional unit: "90s", "30m", "2h", "1d".

[storage]
# SQLite database; defaults to the platform data directory
# database_path = "/var/lib/freebie/freebie.db"

# Seconds before a non-permanent cache row is treated as missing
transient_ttl_secs = 86400

[feed]
subreddit = "FreeGameFindings"
limit = 25

# Retries on 429, 5xx and network errors, with exponential backoff
max_retries = 3
base_delay_ms = 2000

[providers]
timeout_secs = 10

steam_rate = 0.66
epic_rate = 1.0
itch_rate = 1.0
gog_rate = 0.2
playstation_rate = 0.5
itad_rate = 1.0

# IsThereAnyDeal API key for the generic lookup (ITAD_API_KEY overrides)
# itad_api_key = ""
itad_country = "US"

[daemon]
interval = "30m"
scan_on_start = true
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
