//! Periodic device health refresh
//!
//! Each tick probes both devices and republishes the snapshot, which also
//! keeps the cooldown countdown moving for connected observers.

use portal_scenario::ScenarioEngine;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub async fn run_health_monitor(
    engine: ScenarioEngine,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(?interval, "Health monitor started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = engine.refresh_health().await;
                debug!(
                    indicator = snapshot.indicator_online,
                    lighting = snapshot.lighting_available,
                    "Health tick"
                );
            }
        }
    }
    info!("Health monitor stopped");
}
