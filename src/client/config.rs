use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};

/// Default server URL
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000/api";

/// Author stamped on posts when none is configured
const DEFAULT_AUTHOR: &str = "Usuario";

/// Application configuration wrapper.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
    server_url: String,
    token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_app(AppConfig::default())
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a loaded application configuration
    pub fn from_app(app: AppConfig) -> Self {
        let server_url = app
            .server_url
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        let token = app.token.clone();
        Self {
            app,
            server_url: server_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self::from_app(builder.build()?))
    }

    /// Underlying application configuration
    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    /// Set the bearer token
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Get the bearer token
    pub fn get_token(&self) -> Option<&String> {
        self.token.as_ref()
    }

    /// Clear the token (logout)
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Get the full URL for an API endpoint
    ///
    /// Absolute endpoints are returned unchanged.
    pub fn api_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.server_url, path)
        } else {
            format!("{}/{}", self.server_url, path)
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Point the client at another backend
    ///
    /// URLs without an `/api` segment get one appended.
    pub fn set_base_url(&mut self, url: &str) {
        let mut url = url.trim_end_matches('/').to_string();
        if !url.contains("/api") {
            url.push_str("/api");
        }
        self.server_url = url;
    }

    /// Author stamped on created posts
    pub fn author(&self) -> &str {
        self.app.author.as_deref().unwrap_or(DEFAULT_AUTHOR)
    }
}
