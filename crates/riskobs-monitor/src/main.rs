//! Observatory stream monitor - entry point.
//!
//! Connects to the risk observatory WebSocket endpoint, subscribes to
//! the configured topics, and surfaces received frames as logs and
//! Prometheus metrics.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Risk observatory stream monitor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via RISKOBS_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before the first TLS connection
    riskobs_stream::init_crypto();

    let args = Args::parse();

    let config_path = args
        .config
        .or_else(|| std::env::var("RISKOBS_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = if std::path::Path::new(&config_path).exists() {
        riskobs_monitor::AppConfig::from_file(&config_path)?
    } else {
        riskobs_monitor::AppConfig::default()
    };

    riskobs_telemetry::init_logging(&config.telemetry.log_level)?;

    info!("Starting riskobs monitor v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %config_path, ws_url = %config.ws_url, "Configuration loaded");

    let app = riskobs_monitor::Application::new(config);
    app.run().await?;

    Ok(())
}
