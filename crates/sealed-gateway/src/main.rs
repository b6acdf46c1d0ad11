//! `sealed-gateway`: reference server for sealed requests.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise structured JSON logging and optional OTLP span export.
//! 3. Load the RSA private key.
//! 4. Build the Axum router and serve until Ctrl-C.

mod config;
mod keys;
mod opener;
mod server;

use anyhow::{Context, Result};
use tracing::info;

use config::Config;
use server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: gateway configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    sealed_client::telemetry::init_telemetry(
        "sealed-gateway",
        cfg.otlp_endpoint(),
        &cfg.log_level,
    )?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.listen_port,
        "sealed-gateway starting"
    );

    // -----------------------------------------------------------------------
    // 3. Private key
    // -----------------------------------------------------------------------
    let private_key = keys::load_private_key(&cfg.private_key_path)
        .context("failed to load gateway private key")?;

    // -----------------------------------------------------------------------
    // 4. HTTP server
    // -----------------------------------------------------------------------
    let router = server::router::build(AppState::new(private_key));

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    sealed_client::telemetry::shutdown_telemetry();
    Ok(())
}
