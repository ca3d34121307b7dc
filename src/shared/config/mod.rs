//! Application configuration module
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

const ENV_API_URL: &str = "TRAINLOG_API_URL";
const ENV_DB_PATH: &str = "TRAINLOG_DB_PATH";
const ENV_API_TOKEN: &str = "TRAINLOG_API_TOKEN";

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the remote training API
    pub server_url: String,
    /// SQLite file backing the local store
    pub database_path: PathBuf,
    /// Bearer token handed to the HTTP transport, if any
    pub api_token: Option<String>,
    /// Per-request timeout enforced by the HTTP client
    pub request_timeout_secs: u64,
    /// Upper bound on plans delivered concurrently in one sync pass
    pub max_concurrent_plans: usize,
    /// Interval between connectivity probes
    pub probe_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            database_path: default_database_path(),
            api_token: None,
            request_timeout_secs: 15,
            max_concurrent_plans: 4,
            probe_interval_secs: 30,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Defaults, then `file` if given, then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Self::builder();
        if let Some(path) = file {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Read(path.display().to_string(), e.to_string()))?;
            builder = builder.merge_toml(&text)?;
        }
        builder.merge_env().build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if self.max_concurrent_plans == 0 {
            return Err(ConfigError::OutOfRange("max_concurrent_plans"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange("request_timeout_secs"));
        }
        Ok(())
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }
}

/// Platform data directory, falling back to the temp dir.
fn default_database_path() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
    path.push("trainlog");
    path.push("local.db");
    path
}

/// Shape of the optional TOML file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    server_url: Option<String>,
    database_path: Option<PathBuf>,
    api_token: Option<String>,
    request_timeout_secs: Option<u64>,
    max_concurrent_plans: Option<usize>,
    probe_interval_secs: Option<u64>,
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    database_path: Option<PathBuf>,
    api_token: Option<String>,
    request_timeout_secs: Option<u64>,
    max_concurrent_plans: Option<usize>,
    probe_interval_secs: Option<u64>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the database file
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Set the bearer token
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    pub fn max_concurrent_plans(mut self, plans: usize) -> Self {
        self.max_concurrent_plans = Some(plans);
        self
    }

    pub fn probe_interval_secs(mut self, secs: u64) -> Self {
        self.probe_interval_secs = Some(secs);
        self
    }

    /// Overlay values from a TOML document. Values already set win.
    pub fn merge_toml(mut self, text: &str) -> Result<Self, ConfigError> {
        let file: FileConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        self.server_url = self.server_url.or(file.server_url);
        self.database_path = self.database_path.or(file.database_path);
        self.api_token = self.api_token.or(file.api_token);
        self.request_timeout_secs = self.request_timeout_secs.or(file.request_timeout_secs);
        self.max_concurrent_plans = self.max_concurrent_plans.or(file.max_concurrent_plans);
        self.probe_interval_secs = self.probe_interval_secs.or(file.probe_interval_secs);
        Ok(self)
    }

    /// Overlay values from `TRAINLOG_*` environment variables. The environment wins.
    pub fn merge_env(self) -> Self {
        self.merge_vars(|name| std::env::var(name).ok())
    }

    fn merge_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.server_url = Some(url);
        }
        if let Some(path) = var(ENV_DB_PATH).filter(|v| !v.is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(token) = var(ENV_API_TOKEN).filter(|v| !v.is_empty()) {
            self.api_token = Some(token);
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            server_url: self.server_url.unwrap_or(defaults.server_url),
            database_path: self.database_path.unwrap_or(defaults.database_path),
            api_token: self.api_token,
            request_timeout_secs: self
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            max_concurrent_plans: self
                .max_concurrent_plans
                .unwrap_or(defaults.max_concurrent_plans),
            probe_interval_secs: self
                .probe_interval_secs
                .unwrap_or(defaults.probe_interval_secs),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("value out of range: {0}")]
    OutOfRange(&'static str),
    #[error("could not read config file {0}: {1}")]
    Read(String, String),
    #[error("invalid config file: {0}")]
    Parse(String),
}
