//! `robot-web-gateway` — binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (JSON logs, optional OTLP export).
//! 3. Locate the frontend bundle and generate the self-signed certificate.
//! 4. Bind the HTTPS listener, start the bridge task, serve until signalled.
//! 5. Drain connections, stop the bridge, remove the certificate files.

mod bridge;
mod certificate;
mod config;
mod frontend;
mod packages;
mod server;
mod telemetry;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use server::lifecycle;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %cfg.host,
        port = cfg.port,
        "robot-web-gateway starting"
    );
    cfg.warn_if_config_not_yaml();

    // -----------------------------------------------------------------------
    // 3–5. Serve until Ctrl-C / SIGTERM
    // -----------------------------------------------------------------------
    // Handlers go in before the certificate is written.
    let shutdown = lifecycle::shutdown_signal();
    let outcome = lifecycle::run(cfg, shutdown).await;
    telemetry::shutdown_telemetry();
    outcome?;

    info!("robot-web-gateway stopped");
    Ok(())
}
