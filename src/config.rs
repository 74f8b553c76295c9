//! Configuration management for the TeslaFi exporter.
//!
//! Settings are layered, later sources winning:
//! - Optional TOML configuration file
//! - Environment variables (with `TESLAFI_EXPORTER_` prefix, `__` between levels)
//! - Command-line arguments

use crate::error::{Result, TeslaFiError};
use serde::{Deserialize, Serialize};

/// TeslaFi API connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct TeslaFiConfig {
    /// Feed endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API token from https://teslafi.com/api.php
    #[serde(default)]
    pub api_token: String,

    /// Feed command sent with every scrape (empty = current data)
    #[serde(default = "default_command")]
    pub command: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl std::fmt::Debug for TeslaFiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeslaFiConfig")
            .field("endpoint", &self.endpoint)
            .field("api_token", &"***REDACTED***")
            .field("command", &self.command)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for TeslaFiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_token: String::new(),
            command: default_command(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Exporter specific settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExporterConfig {
    /// Address to bind the metrics endpoint to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Port for the metrics endpoint
    #[serde(default = "default_port")]
    pub port: u16,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

impl ExporterConfig {
    /// Socket address string the HTTP server binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.listen_addr, self.port)
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Main configuration structure for the TeslaFi exporter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// TeslaFi API configuration
    #[serde(default)]
    pub teslafi: TeslaFiConfig,

    /// Exporter server configuration
    #[serde(default)]
    pub exporter: ExporterConfig,
}

/// Values given on the command line. `None` leaves the layered value alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub api_token: Option<String>,
    pub log_level: Option<String>,
}

fn default_endpoint() -> String {
    "https://www.teslafi.com/feed.php".to_string()
}

fn default_command() -> String {
    "lastGood".to_string()
}

fn default_timeout() -> u64 {
    5
}

fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9998
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load configuration from a file, environment variables and CLI overrides.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Optional path to a configuration file; it must exist when given
    /// * `overrides` - Values passed on the command line
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use teslafi_exporter::config::{CliOverrides, Settings};
    ///
    /// let overrides = CliOverrides {
    ///     api_token: Some("abc123".to_string()),
    ///     ..Default::default()
    /// };
    /// let settings = Settings::load(None, &overrides).unwrap();
    /// assert_eq!(settings.exporter.port, 9998);
    /// ```
    pub fn load(config_path: Option<&str>, overrides: &CliOverrides) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(
                config::Environment::with_prefix("TESLAFI_EXPORTER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("teslafi.api_token", overrides.api_token.clone())?
            .set_override_option("exporter.port", overrides.port.map(i64::from))?
            .set_override_option("exporter.log_level", overrides.log_level.clone())?;

        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration settings.
    pub fn validate(&self) -> Result<()> {
        if self.teslafi.api_token.trim().is_empty() {
            return Err(config_error(
                "TeslaFi API token is required (--teslafi_api_token or TESLAFI_API_TOKEN)",
            ));
        }

        if let Err(e) = reqwest::Url::parse(&self.teslafi.endpoint) {
            return Err(config_error(&format!(
                "invalid TeslaFi endpoint '{}': {}",
                self.teslafi.endpoint, e
            )));
        }

        if self.teslafi.timeout_seconds == 0 {
            return Err(config_error("timeout_seconds must be greater than zero"));
        }

        if self.exporter.port == 0 {
            return Err(config_error("port must be between 1 and 65535"));
        }

        Ok(())
    }
}

fn config_error(message: &str) -> TeslaFiError {
    TeslaFiError::Config(config::ConfigError::Message(message.to_string()))
}
