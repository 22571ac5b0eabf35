//! Haunted portal controller
//!
//! Main entry point: loads configuration, wires the devices into the
//! scenario engine, and runs the API server, the MQTT loop and the health
//! monitor until Ctrl-C.

mod app;
mod health;
mod mqtt;

use anyhow::{Context, Result};
use portal_api::AppState;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn config_path() -> Option<PathBuf> {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PORTAL_CONFIG").ok())
        .map(PathBuf::from)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting haunted portal controller");

    let config = portal_config::load_config(config_path().as_deref())
        .context("Failed to load configuration")?;
    let controller = app::build(&config);

    controller.visitors.load().await;
    info!("Setting initial device state");
    controller.engine.apply_initial_state().await;

    let shutdown = CancellationToken::new();

    let api_state = AppState {
        engine: controller.engine.clone(),
        visitors: controller.visitors.clone(),
    };
    let addr = config.web.addr();
    let api_shutdown = shutdown.clone();
    let api = tokio::spawn(async move {
        portal_api::start_server(api_state, &addr, async move {
            api_shutdown.cancelled().await
        })
        .await
    });

    let health = tokio::spawn(health::run_health_monitor(
        controller.engine.clone(),
        config.health.interval(),
        shutdown.clone(),
    ));
    let bus = tokio::spawn(mqtt::run_mqtt(
        config.mqtt.clone(),
        controller.router.clone(),
        shutdown.clone(),
    ));

    if controller.engine.lighting().is_none() {
        info!("Running in degraded mode (no lighting)");
    }
    info!("Controller ready, waiting for triggers");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    shutdown.cancel();

    match api.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API task panicked"),
    }
    let _ = tokio::join!(health, bus);

    info!("Stopped");
    Ok(())
}
