use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use teslafi_exporter::{
    client::TeslaFiClient,
    config::{CliOverrides, LogFormat, Settings},
    metrics::MetricsCollector,
    server::start_server,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// TeslaFi Exporter - Prometheus metrics exporter for TeslaFi vehicle telemetry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to expose the metrics endpoint on (default: 9998)
    #[arg(long)]
    port: Option<u16>,

    /// TeslaFi API token from https://teslafi.com/api.php
    #[arg(long = "teslafi_api_token", env = "TESLAFI_API_TOKEN", hide_env_values = true)]
    teslafi_api_token: Option<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let overrides = CliOverrides {
        port: args.port,
        api_token: args.teslafi_api_token,
        log_level: args.log_level,
    };

    // Load and validate configuration before anything is bound
    let settings = Settings::load(args.config.as_deref(), &overrides)?;

    // Initialize logging
    init_logging(&settings.exporter.log_level, settings.exporter.log_format);

    info!("Starting TeslaFi Exporter v{}", env!("CARGO_PKG_VERSION"));
    info!("TeslaFi endpoint: {}", settings.teslafi.endpoint);
    info!("Listen address: {}", settings.exporter.listen_address());

    // Create TeslaFi client
    let client = TeslaFiClient::new(settings.teslafi.clone())?;
    info!("TeslaFi client initialized");

    // Create metrics collector
    let metrics = MetricsCollector::new(Arc::new(client))?;
    info!("Metrics collector initialized");

    // Start HTTP server
    if let Err(e) = start_server(&settings.exporter.listen_address(), metrics).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

/// Initialize structured logging with tracing.
fn init_logging(log_level: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}
