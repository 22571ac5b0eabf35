//! Recording fake devices for tests
//!
//! Both fakes append to a call log that can be shared between them, so a
//! test can assert the interleaving of indicator and lighting commands.

use async_trait::async_trait;
use portal_devices::{IndicatorActuator, IndicatorReport, LightingActuator};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A device command as seen by a fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    IndicatorAlert,
    IndicatorAcknowledge,
    IndicatorReset,
    Preset(String),
    SetBrightness(String, u8),
    TurnOff(String),
}

/// Ordered log of device calls
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<DeviceCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: DeviceCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Indicator that records commands and reports a settable state
#[derive(Debug)]
pub struct FakeIndicator {
    log: CallLog,
    state: AtomicI64,
    online: AtomicBool,
    delay: Duration,
}

impl FakeIndicator {
    pub fn new() -> Self {
        Self::with_log(CallLog::new())
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            state: AtomicI64::new(1),
            online: AtomicBool::new(true),
            delay: Duration::ZERO,
        }
    }

    /// Every command takes `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set_state(&self, state: i64) {
        self.state.store(state, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.log.calls()
    }

    async fn record(&self, call: DeviceCall, state: i64) -> bool {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log.push(call);
        if self.online.load(Ordering::SeqCst) {
            self.state.store(state, Ordering::SeqCst);
            true
        } else {
            false
        }
    }
}

impl Default for FakeIndicator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndicatorActuator for FakeIndicator {
    async fn alert(&self) -> bool {
        self.record(DeviceCall::IndicatorAlert, 2).await
    }

    async fn acknowledge(&self) -> bool {
        self.record(DeviceCall::IndicatorAcknowledge, 3).await
    }

    async fn reset(&self) -> bool {
        self.record(DeviceCall::IndicatorReset, 1).await
    }

    async fn get_state(&self) -> Option<IndicatorReport> {
        self.online
            .load(Ordering::SeqCst)
            .then(|| IndicatorReport {
                state: self.state.load(Ordering::SeqCst),
            })
    }

    async fn is_reachable(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Lighting controller that records commands
#[derive(Debug)]
pub struct FakeLighting {
    log: CallLog,
    healthy: AtomicBool,
    delay: Duration,
    probe_delay: Duration,
}

impl FakeLighting {
    pub fn new(healthy: bool) -> Self {
        Self::with_log(CallLog::new(), healthy)
    }

    pub fn with_log(log: CallLog, healthy: bool) -> Self {
        Self {
            log,
            healthy: AtomicBool::new(healthy),
            delay: Duration::ZERO,
            probe_delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Health checks take `delay` before answering
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.log.calls()
    }

    async fn record(&self, call: DeviceCall) -> bool {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log.push(call);
        self.healthy.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LightingActuator for FakeLighting {
    async fn activate_preset(&self, preset: &str) -> bool {
        self.record(DeviceCall::Preset(preset.to_string())).await
    }

    async fn set_brightness(&self, entity: &str, brightness: u8) -> bool {
        self.record(DeviceCall::SetBrightness(entity.to_string(), brightness))
            .await
    }

    async fn turn_off(&self, entity: &str) -> bool {
        self.record(DeviceCall::TurnOff(entity.to_string())).await
    }

    async fn health_check(&self) -> bool {
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        self.healthy.load(Ordering::SeqCst)
    }
}
