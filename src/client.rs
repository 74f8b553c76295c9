//! TeslaFi API client.
//!
//! This module provides a client for the TeslaFi feed endpoint, which returns
//! the most recent telemetry of the vehicle linked to an API token.

use crate::config::TeslaFiConfig;
use crate::error::FetchError;
use crate::snapshot::Snapshot;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Feed command returning the last data set that carried temperatures.
pub const LAST_GOOD_TEMP_COMMAND: &str = "lastGoodTemp";

/// TeslaFi API client.
#[derive(Clone)]
pub struct TeslaFiClient {
    client: Client,
    config: TeslaFiConfig,
}

impl TeslaFiClient {
    /// Create a new TeslaFi API client.
    ///
    /// # Arguments
    ///
    /// * `config` - TeslaFi configuration
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use teslafi_exporter::client::TeslaFiClient;
    /// use teslafi_exporter::config::TeslaFiConfig;
    ///
    /// let config = TeslaFiConfig {
    ///     api_token: "abc123".to_string(),
    ///     ..Default::default()
    /// };
    /// let client = TeslaFiClient::new(config).unwrap();
    /// ```
    pub fn new(config: TeslaFiConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("teslafi-exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Network)?;

        Ok(Self { client, config })
    }

    /// Fetch the vehicle snapshot using the configured feed command.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        self.fetch_command(&self.config.command).await
    }

    /// Fetch a snapshot with an explicit feed command. An empty command asks
    /// for the current data.
    pub async fn fetch_command(&self, command: &str) -> Result<Snapshot, FetchError> {
        let mut query = vec![("token", self.config.api_token.as_str())];
        if !command.is_empty() {
            query.push(("command", command));
        }

        // The token travels in the query string. Only the endpoint is logged and
        // transport errors are stripped of the request URL.
        debug!(
            "Fetching TeslaFi snapshot from {} (command: {:?})",
            self.config.endpoint, command
        );

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("TeslaFi API returned {}", status);
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.without_url()))?;
        debug!("Raw TeslaFi response: {} bytes", body.len());

        parse_snapshot(&body)
    }
}

/// Parse a feed response body.
///
/// TeslaFi signals failures such as an invalid token with HTTP 200 and an
/// envelope of the form `{"response": {"result": "..."}}`.
pub fn parse_snapshot(body: &str) -> Result<Snapshot, FetchError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("{}. Body preview: {}...", e, preview(body))))?;

    let object = value.as_object().ok_or_else(|| {
        FetchError::Parse(format!("expected a JSON object, got: {}", preview(body)))
    })?;

    if let Some(envelope) = object.get("response") {
        let result = envelope
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        warn!("Unsuccessful TeslaFi API response: {}", result);
        return Err(FetchError::Rejected { result });
    }

    Snapshot::deserialize(value).map_err(|e| FetchError::Parse(e.to_string()))
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
