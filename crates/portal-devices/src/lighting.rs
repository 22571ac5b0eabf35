//! Lighting controller client
//!
//! Talks to the Home Assistant REST API: scenes through
//! `POST services/scene/turn_on`, single lights through
//! `services/light/turn_on` and `services/light/turn_off`, health through
//! `GET /` which answers `{"message": "API running."}`.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::error::{DeviceError, DeviceResult};

const API_RUNNING: &str = "API running.";

/// Commands understood by the lighting controller
#[async_trait]
pub trait LightingActuator: Send + Sync {
    /// Activate a named scene preset
    async fn activate_preset(&self, preset: &str) -> bool;

    /// Turn a light on at the given brightness (0-255)
    async fn set_brightness(&self, entity: &str, brightness: u8) -> bool;

    /// Turn a light off
    async fn turn_off(&self, entity: &str) -> bool;

    /// Whether the controller answers its API root
    async fn health_check(&self) -> bool;
}

/// Home Assistant REST client
#[derive(Debug, Clone)]
pub struct HomeAssistantLighting {
    client: Client,
    /// API root without trailing slash, e.g. `http://ha.local:8123/api`
    api_root: String,
    token: String,
    timeout: Duration,
    probe_timeout: Duration,
}

impl HomeAssistantLighting {
    pub fn new(
        api_root: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            api_root: api_root.into().trim_end_matches('/').to_string(),
            token: token.into(),
            timeout,
            probe_timeout,
        }
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    async fn call_service(&self, domain: &str, service: &str, data: Value) -> DeviceResult<()> {
        let url = format!("{}/services/{}/{}", self.api_root, domain, service);
        trace!(%url, %data, "Calling lighting service");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&data)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DeviceError::Request {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(DeviceError::Status {
                url,
                status: response.status(),
            });
        }
        Ok(())
    }

    async fn probe(&self) -> DeviceResult<()> {
        let url = format!("{}/", self.api_root);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| DeviceError::Request {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(DeviceError::Status {
                url,
                status: response.status(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| DeviceError::UnexpectedBody {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        match body.get("message").and_then(Value::as_str) {
            Some(API_RUNNING) => Ok(()),
            other => Err(DeviceError::UnexpectedBody {
                url,
                reason: format!("message was {:?}", other),
            }),
        }
    }

    fn absorb(result: DeviceResult<()>, what: &str) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Lighting call failed: {}", what);
                false
            }
        }
    }
}

#[async_trait]
impl LightingActuator for HomeAssistantLighting {
    async fn activate_preset(&self, preset: &str) -> bool {
        let result = self
            .call_service("scene", "turn_on", json!({ "entity_id": preset }))
            .await;
        Self::absorb(result, preset)
    }

    async fn set_brightness(&self, entity: &str, brightness: u8) -> bool {
        let result = self
            .call_service(
                "light",
                "turn_on",
                json!({ "entity_id": entity, "brightness": brightness }),
            )
            .await;
        Self::absorb(result, entity)
    }

    async fn turn_off(&self, entity: &str) -> bool {
        let result = self
            .call_service("light", "turn_off", json!({ "entity_id": entity }))
            .await;
        Self::absorb(result, entity)
    }

    async fn health_check(&self) -> bool {
        match self.probe().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Lighting health check failed");
                false
            }
        }
    }
}
