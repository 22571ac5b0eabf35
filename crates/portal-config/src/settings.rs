//! Configuration sections
//!
//! Every section carries `#[serde(default)]` so a partial YAML file only has
//! to name what it changes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Full controller configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub mqtt: MqttConfig,
    pub scenario: ScenarioConfig,
    pub web: WebConfig,
    pub portal: PortalDeviceConfig,
    pub lighting: LightingConfig,
    pub storage: StorageConfig,
    pub health: HealthConfig,
}

/// Message bus connection and topics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker hostname; required
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Topic carrying the camera's person count
    pub person_topic: String,
    /// Topic carrying the indicator's own state code
    pub portal_state_topic: String,
    pub keep_alive_secs: u64,
    pub reconnect_delay_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            client_id: "haunted-portal".to_string(),
            person_topic: "frigate/insidan/person".to_string(),
            portal_state_topic: "portal/state".to_string(),
            keep_alive_secs: 60,
            reconnect_delay_secs: 5,
        }
    }
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Scenario timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Lockout after a completed run
    pub cooldown_secs: u64,
    /// Repetitions of the flicker pattern
    pub flicker_rounds: u32,
    /// Wait substituted for the lighting phases when lighting is down
    pub degraded_wait_secs: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 30,
            flicker_rounds: 3,
            degraded_wait_secs: 30,
        }
    }
}

impl ScenarioConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn degraded_wait(&self) -> Duration {
        Duration::from_secs(self.degraded_wait_secs)
    }
}

/// HTTP/WebSocket listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl WebConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Indicator (portal) device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalDeviceConfig {
    /// Host or IP, optionally with a scheme
    pub address: String,
    pub timeout_secs: u64,
    /// Timeout used for reachability probes
    pub probe_timeout_secs: u64,
}

impl Default for PortalDeviceConfig {
    fn default() -> Self {
        Self {
            address: "10.1.5.32".to_string(),
            timeout_secs: 5,
            probe_timeout_secs: 3,
        }
    }
}

impl PortalDeviceConfig {
    /// Base URL for device requests
    pub fn base_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Lighting controller (Home Assistant REST API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// API root, e.g. `http://ha.local:8123/api/`; `None` disables lighting
    pub server: Option<String>,
    pub token: Option<String>,
    /// Light driven by the flicker effect
    pub flicker_light: String,
    /// Preset that turns all lights off
    pub scene_off: String,
    /// Preset restoring normal lighting
    pub scene_on: String,
    pub timeout_secs: u64,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            server: None,
            token: None,
            flicker_light: "light.ytterbelysning_entre".to_string(),
            scene_off: "scene.halloween_av".to_string(),
            scene_on: "scene.halloween_pa".to_string(),
            timeout_secs: 5,
        }
    }
}

impl LightingConfig {
    /// Lighting is wired in only when both server and token are present
    pub fn is_configured(&self) -> bool {
        self.server.as_deref().is_some_and(|s| !s.is_empty())
            && self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub visitors_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            visitors_file: "visitors.json".to_string(),
        }
    }
}

/// Periodic device health refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { interval_secs: 15 }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
