//! Application configuration module
//!
//! Provides configuration types for the application. Values come from an
//! optional TOML file and are overridden by environment variables:
//!
//! | variable             | field           |
//! |----------------------|-----------------|
//! | `POSTSYNC_API_URL`   | `server_url`    |
//! | `POSTSYNC_DB_PATH`   | `database_path` |
//! | `POSTSYNC_TOKEN`     | `token`         |
//! | `POSTSYNC_AUTHOR`    | `author`        |

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Server URL
    pub server_url: Option<String>,
    /// Location of the outbox database file
    pub database_path: Option<PathBuf>,
    /// Bearer token for the API
    pub token: Option<String>,
    /// Author name stamped on created posts
    pub author: Option<String>,
    /// Attempt ceiling before an operation is marked failed
    pub max_attempts: Option<u32>,
    /// Per-delivery timeout in milliseconds
    pub delivery_timeout_ms: Option<u64>,
    /// Health probe interval in seconds (no probing when unset)
    pub probe_interval_secs: Option<u64>,
    /// Drain automatically when connectivity returns
    pub auto_sync: Option<bool>,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
                Self::from_toml_str(&text)?
            }
            None => AppConfig::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `POSTSYNC_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("POSTSYNC_API_URL") {
            self.server_url = Some(url);
        }
        if let Ok(path) = std::env::var("POSTSYNC_DB_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Ok(token) = std::env::var("POSTSYNC_TOKEN") {
            self.token = Some(token);
        }
        if let Ok(author) = std::env::var("POSTSYNC_AUTHOR") {
            self.author = Some(author);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.server_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        if self.delivery_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "delivery_timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = Some(url.into());
        self
    }

    /// Set the outbox database path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = Some(path.into());
        self
    }

    /// Set the bearer token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    /// Set the post author
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.author = Some(author.into());
        self
    }

    /// Set the attempt ceiling
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = Some(max_attempts);
        self
    }

    /// Set the per-delivery timeout
    pub fn delivery_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.delivery_timeout_ms = Some(timeout_ms);
        self
    }

    /// Enable health probing at the given interval
    pub fn probe_interval_secs(mut self, secs: u64) -> Self {
        self.config.probe_interval_secs = Some(secs);
        self
    }

    /// Enable or disable automatic drains on reconnect
    pub fn auto_sync(mut self, enabled: bool) -> Self {
        self.config.auto_sync = Some(enabled);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("could not parse configuration: {0}")]
    Parse(String),
    #[error("could not read configuration: {0}")]
    Io(String),
}

impl From<ConfigError> for crate::shared::error::SyncError {
    fn from(err: ConfigError) -> Self {
        Self::config(err.to_string())
    }
}
