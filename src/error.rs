//! Error types for the TeslaFi exporter.
//!
//! This module defines custom error types using `thiserror` for structured
//! error handling throughout the application.

use thiserror::Error;

/// Main error type for TeslaFi exporter operations.
#[derive(Debug, Error)]
pub enum TeslaFiError {
    /// Error fetching a snapshot from the TeslaFi API
    #[error("TeslaFi fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Metrics registration or rendering error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// HTTP server error
    #[error("HTTP server error: {0}")]
    Server(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single call to the TeslaFi feed.
///
/// Every kind is recoverable: the scrape that hit it keeps serving the
/// previously collected values.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeout, DNS failure, refused connection or a broken body stream.
    /// Carries no request URL, which would include the token.
    #[error("network error: {0}")]
    Network(reqwest::Error),

    /// TeslaFi answered with a non-success status code
    #[error("HTTP status {status}")]
    Http { status: u16 },

    /// Response body was not a JSON object
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// TeslaFi returned its error envelope instead of vehicle data
    #[error("request rejected by TeslaFi: {result}")]
    Rejected { result: String },
}

/// Result type alias for TeslaFi exporter operations.
pub type Result<T> = std::result::Result<T, TeslaFiError>;
