//! # TeslaFi Exporter
//!
//! A Prometheus metrics exporter for vehicle telemetry collected by
//! [TeslaFi](https://teslafi.com).
//!
//! ## Overview
//!
//! On every scrape of `/metrics` the exporter asks the TeslaFi feed for the
//! vehicle's last known data, maps the fields it knows to gauges and renders
//! them in the Prometheus text format:
//!
//! - Battery, range and charging metrics
//! - Climate and temperature metrics
//! - Location, speed and power
//! - Doors, windows, locks and other vehicle state
//! - Vehicle identity and software version as info metrics
//!
//! When TeslaFi cannot be reached the last collected values are served
//! unchanged.
//!
//! ## Quick Start
//!
//! ```no_run
//! use teslafi_exporter::{
//!     client::TeslaFiClient,
//!     config::{CliOverrides, Settings},
//!     metrics::MetricsCollector,
//!     server::start_server,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let overrides = CliOverrides {
//!         api_token: Some("abc123".to_string()),
//!         ..Default::default()
//!     };
//!     let settings = Settings::load(None, &overrides)?;
//!
//!     let client = TeslaFiClient::new(settings.teslafi)?;
//!     let metrics = MetricsCollector::new(std::sync::Arc::new(client))?;
//!
//!     start_server(&settings.exporter.listen_address(), metrics).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! The exporter can be configured via:
//! - TOML configuration file
//! - Environment variables (with `TESLAFI_EXPORTER_` prefix)
//! - Command-line arguments
//!
//! See [`config::Settings`] for details.
//!
//! ## Modules
//!
//! - [`client`] - TeslaFi API client
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling
//! - [`metrics`] - Prometheus metrics definitions and collection
//! - [`server`] - HTTP server for exposing metrics
//! - [`snapshot`] - Typed vehicle telemetry snapshot

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;
pub mod snapshot;

pub use error::{FetchError, Result, TeslaFiError};
