//! HTTP server for exposing Prometheus metrics.
//!
//! This module provides an Axum-based HTTP server that serves the `/metrics`
//! endpoint for Prometheus scraping and a `/health` endpoint for health checks.

use crate::error::{Result, TeslaFiError};
use crate::metrics::MetricsCollector;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const CONTENT_TYPE_TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

const ROUTES: &[(&str, &str)] = &[
    ("/metrics", "vehicle telemetry in Prometheus format"),
    ("/health", "liveness check"),
];

/// Shared application state.
#[derive(Clone)]
struct AppState {
    metrics: Arc<MetricsCollector>,
}

/// Start the HTTP server.
///
/// # Arguments
///
/// * `listen_address` - Address to bind to (e.g., "0.0.0.0:9998")
/// * `metrics` - Metrics collector instance
///
/// # Examples
///
/// ```no_run
/// use teslafi_exporter::client::TeslaFiClient;
/// use teslafi_exporter::config::TeslaFiConfig;
/// use teslafi_exporter::metrics::MetricsCollector;
/// use teslafi_exporter::server::start_server;
///
/// #[tokio::main]
/// async fn main() {
///     let config = TeslaFiConfig {
///         api_token: "abc123".to_string(),
///         ..Default::default()
///     };
///     let client = TeslaFiClient::new(config).unwrap();
///     let metrics = MetricsCollector::new(std::sync::Arc::new(client)).unwrap();
///     start_server("0.0.0.0:9998", metrics).await.unwrap();
/// }
/// ```
pub async fn start_server(listen_address: &str, metrics: MetricsCollector) -> Result<()> {
    info!("Starting HTTP server on {}", listen_address);

    let listener = TcpListener::bind(listen_address).await?;

    serve(listener, metrics).await
}

/// Serve the exporter routes on an already bound listener.
pub async fn serve(listener: TcpListener, metrics: MetricsCollector) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Metrics available at http://{}/metrics", addr);
    }

    axum::serve(listener, router(metrics))
        .await
        .map_err(|e| TeslaFiError::Server(e.to_string()))?;

    Ok(())
}

fn router(metrics: MetricsCollector) -> Router {
    let state = AppState {
        metrics: Arc::new(metrics),
    };

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/", get(root_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for /metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    info!("Received metrics scrape request");

    // Fetch failures are absorbed by the collector; only rendering can fail.
    match state.metrics.scrape().await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, CONTENT_TYPE_TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}

/// Handler for /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}

/// Landing page linking the exporter routes.
async fn root_handler() -> Response {
    let links: String = ROUTES
        .iter()
        .map(|(path, what)| format!("<li><a href=\"{path}\">{path}</a>: {what}</li>"))
        .collect();

    let html = format!(
        "<!DOCTYPE html><html><head><title>TeslaFi Exporter</title></head>\
         <body><h1>TeslaFi Exporter {version}</h1><ul>{links}</ul></body></html>",
        version = env!("CARGO_PKG_VERSION"),
    );

    (StatusCode::OK, axum::response::Html(html)).into_response()
}
