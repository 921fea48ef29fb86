//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `remotehub.toml` in the working directory, or the file named by
//! `REMOTEHUB_CONFIG`. Every field has a default so the file is optional.
//! Environment variables take precedence over file values.

use std::path::{Path, PathBuf};

use remotehub_domain::settings::{DiscoveryInfo, HubEntry};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "remotehub.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Where hub configuration snapshots are written.
    pub storage: StorageConfig,
    /// Statically configured hubs.
    pub hubs: Vec<HubEntry>,
    /// Hubs announced at startup, as a discovery listener would.
    pub discovery: Vec<DiscoveryInfo>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory receiving one `hub_<slug>.conf` per hub.
    pub config_dir: PathBuf,
}

impl Config {
    /// Load configuration from `remotehub.toml` (or `REMOTEHUB_CONFIG`) then
    /// apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os("REMOTEHUB_CONFIG").map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Parse TOML content.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed content.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("REMOTEHUB_CONFIG_DIR") {
            self.storage.config_dir = PathBuf::from(val);
        }
        if let Some(val) = var("REMOTEHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    /// Check every hub and discovery entry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first offending entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for hub in &self.hubs {
            if hub.name.trim().is_empty() {
                return Err(ConfigError::Validation("hub name must not be empty".to_string()));
            }
            if hub.port == 0 {
                return Err(ConfigError::Validation(format!("hub {:?}: port must be non-zero", hub.name)));
            }
            if !hub.delay_secs.is_finite() || hub.delay_secs < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "hub {:?}: delay_secs must be a non-negative number",
                    hub.name
                )));
            }
            if hub.host.as_deref().is_some_and(|h| h.trim().is_empty()) {
                return Err(ConfigError::Validation(format!("hub {:?}: host must not be blank", hub.name)));
            }
        }
        for found in &self.discovery {
            if found.name.trim().is_empty() || found.host.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "discovery entries need a name and a host".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "remotehubd=info,remotehub=info".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("."),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
