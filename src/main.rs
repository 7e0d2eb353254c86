//! Server binary for the intake bridge.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use intake_bridge::config::BridgeConfig;
use intake_bridge::routes;
use intake_bridge::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "intake-bridge", version, about = "Voice session bridge for phone-based waitlist intake")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .ok();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => BridgeConfig::from_env().context("loading configuration from environment")?,
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    config.validate().context("invalid configuration")?;

    let address = config.address();
    let state = AppState::new(config);
    let shutdown = state.shutdown.clone();
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(address = %address, "intake bridge listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received, closing active calls");
            shutdown.cancel();
        })
        .await
        .context("server error")?;

    Ok(())
}
