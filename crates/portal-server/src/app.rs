//! Controller assembly
//!
//! Builds the device clients, the scenario engine, the visitor counter and
//! the bus router from a loaded configuration.

use portal_config::PortalConfig;
use portal_devices::{HomeAssistantLighting, HttpIndicator, LightingActuator};
use portal_scenario::{EventRouter, ScenarioEngine, ScenarioSettings, VisitorCounter};
use portal_storage::JsonCounterStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the tasks in `main` share
#[derive(Debug, Clone)]
pub struct Controller {
    pub engine: ScenarioEngine,
    pub visitors: VisitorCounter,
    pub router: EventRouter,
}

pub fn scenario_settings(config: &PortalConfig) -> ScenarioSettings {
    ScenarioSettings {
        cooldown: config.scenario.cooldown(),
        flicker_rounds: config.scenario.flicker_rounds,
        degraded_wait: config.scenario.degraded_wait(),
        flicker_light: config.lighting.flicker_light.clone(),
        scene_off: config.lighting.scene_off.clone(),
        scene_on: config.lighting.scene_on.clone(),
    }
}

fn lighting_client(config: &PortalConfig) -> Option<Arc<dyn LightingActuator>> {
    let lighting = &config.lighting;
    match (&lighting.server, &lighting.token) {
        (Some(server), Some(token)) if lighting.is_configured() => {
            info!(%server, "Lighting controller configured");
            Some(Arc::new(HomeAssistantLighting::new(
                server.clone(),
                token.clone(),
                lighting.timeout(),
                config.portal.probe_timeout(),
            )))
        }
        _ => {
            warn!("Lighting controller not configured, scenarios run indicator-only");
            None
        }
    }
}

pub fn build(config: &PortalConfig) -> Controller {
    let indicator = Arc::new(HttpIndicator::new(
        config.portal.base_url(),
        config.portal.timeout(),
        config.portal.probe_timeout(),
    ));
    info!(url = %indicator.base_url(), "Indicator configured");

    let engine = ScenarioEngine::new(
        scenario_settings(config),
        indicator,
        lighting_client(config),
    );
    let visitors = VisitorCounter::new(
        engine.state().clone(),
        Arc::new(JsonCounterStore::new(&config.storage.visitors_file)),
    );
    let router = EventRouter::new(
        engine.clone(),
        &config.mqtt.person_topic,
        &config.mqtt.portal_state_topic,
    );

    Controller {
        engine,
        visitors,
        router,
    }
}
