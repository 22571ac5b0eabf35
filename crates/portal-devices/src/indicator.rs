//! Indicator (RGB portal) client
//!
//! The portal firmware exposes plain GET endpoints:
//!
//! | Path     | Effect                                   |
//! |----------|------------------------------------------|
//! | `/red`   | blink red, then hold red (alert, state 2) |
//! | `/green` | blink green, back to rotating (state 3)   |
//! | `/reset` | green rotating animation (state 1)        |
//! | `/state` | `{"state": <code>}`                       |

use async_trait::async_trait;
use portal_core::{IndicatorState, InvalidIndicatorState};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DeviceError, DeviceResult};

/// State payload returned by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorReport {
    pub state: i64,
}

impl IndicatorReport {
    pub fn parsed(&self) -> Result<IndicatorState, InvalidIndicatorState> {
        IndicatorState::from_code(self.state)
    }
}

/// Commands understood by the indicator device
#[async_trait]
pub trait IndicatorActuator: Send + Sync {
    /// Switch to the alert state
    async fn alert(&self) -> bool;

    /// Short acknowledge blink
    async fn acknowledge(&self) -> bool;

    /// Back to the idle rotating state
    async fn reset(&self) -> bool;

    /// Current device state, `None` when unreachable
    async fn get_state(&self) -> Option<IndicatorReport>;

    /// Quick reachability probe
    async fn is_reachable(&self) -> bool;
}

/// HTTP client for the portal firmware
#[derive(Debug, Clone)]
pub struct HttpIndicator {
    client: Client,
    base_url: String,
    timeout: Duration,
    probe_timeout: Duration,
}

impl HttpIndicator {
    pub fn new(base_url: impl Into<String>, timeout: Duration, probe_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            probe_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str, timeout: Duration) -> DeviceResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .timeout(timeout)
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
        Ok(response)
    }

    async fn fetch_state(&self) -> DeviceResult<IndicatorReport> {
        let response = self.get("/state", self.timeout).await?;
        let url = response.url().to_string();
        response
            .json::<IndicatorReport>()
            .await
            .map_err(|e| DeviceError::UnexpectedBody {
                url,
                reason: e.to_string(),
            })
    }

    async fn command(&self, path: &str, label: &str) -> bool {
        match self.get(path, self.timeout).await {
            Ok(_) => {
                info!("Indicator: {}", label);
                true
            }
            Err(e) => {
                warn!(error = %e, "Indicator command failed: {}", label);
                false
            }
        }
    }
}

#[async_trait]
impl IndicatorActuator for HttpIndicator {
    async fn alert(&self) -> bool {
        self.command("/red", "alert").await
    }

    async fn acknowledge(&self) -> bool {
        self.command("/green", "acknowledge").await
    }

    async fn reset(&self) -> bool {
        self.command("/reset", "reset to rotating").await
    }

    async fn get_state(&self) -> Option<IndicatorReport> {
        match self.fetch_state().await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Failed to read indicator state");
                None
            }
        }
    }

    async fn is_reachable(&self) -> bool {
        match self.get("/state", self.probe_timeout).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Indicator unreachable");
                false
            }
        }
    }
}
