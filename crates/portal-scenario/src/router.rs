//! Bus message routing
//!
//! Turns raw bus messages into state updates and trigger attempts. Two
//! topics matter: the presence topic carries a person count, the indicator
//! topic carries the device's state code. Both end up in the same admission
//! check and the same run.

use portal_core::{Admission, IndicatorState, TriggerSource};
use tracing::{debug, info, warn};

use crate::engine::ScenarioEngine;

/// What happened to a bus message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Topic not handled
    Ignored,
    /// Payload could not be parsed; nothing changed
    Malformed,
    /// State updated, no trigger condition
    Recorded,
    /// Trigger condition met while auto-trigger is off
    AutoTriggerDisabled,
    /// Trigger condition met; admission verdict attached
    Triggered(Admission),
}

/// Routes bus messages into the scenario engine
#[derive(Debug, Clone)]
pub struct EventRouter {
    engine: ScenarioEngine,
    person_topic: String,
    indicator_topic: String,
}

impl EventRouter {
    pub fn new(
        engine: ScenarioEngine,
        person_topic: impl Into<String>,
        indicator_topic: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            person_topic: person_topic.into(),
            indicator_topic: indicator_topic.into(),
        }
    }

    pub fn engine(&self) -> &ScenarioEngine {
        &self.engine
    }

    /// Topics to subscribe to
    pub fn topics(&self) -> [&str; 2] {
        [&self.person_topic, &self.indicator_topic]
    }

    /// Handle one message; never waits for a run
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> RouteOutcome {
        let text = String::from_utf8_lossy(payload);
        debug!(%topic, payload = %text, "Bus message");
        // Recorded before parsing, so malformed payloads show up too
        self.engine.state().record_bus_message(topic, &text);

        if topic == self.indicator_topic {
            self.on_indicator_state(&text)
        } else if topic == self.person_topic {
            self.on_person_count(&text).await
        } else {
            RouteOutcome::Ignored
        }
    }

    fn on_indicator_state(&self, payload: &str) -> RouteOutcome {
        let state: IndicatorState = match payload.parse() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Dropping indicator state message");
                return RouteOutcome::Malformed;
            }
        };

        let previous = self.engine.state().record_indicator_state(state);
        info!(?previous, current = ?state, "Indicator state updated");

        let entered_alert = state == IndicatorState::Alert && previous != Some(IndicatorState::Alert);
        if !entered_alert {
            return RouteOutcome::Recorded;
        }
        if !self.engine.state().auto_trigger_enabled() {
            info!("Auto-trigger disabled, ignoring indicator alert");
            return RouteOutcome::AutoTriggerDisabled;
        }
        RouteOutcome::Triggered(self.engine.admit(TriggerSource::ExternalState))
    }

    async fn on_person_count(&self, payload: &str) -> RouteOutcome {
        let count: u32 = match payload.trim().parse() {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, payload, "Dropping person count message");
                return RouteOutcome::Malformed;
            }
        };

        self.engine.state().record_person_count(count);
        if count == 0 {
            return RouteOutcome::Recorded;
        }

        info!(count, "Person detected");
        if !self.engine.state().auto_trigger_enabled() {
            info!("Auto-trigger disabled, ignoring camera detection");
            return RouteOutcome::AutoTriggerDisabled;
        }
        RouteOutcome::Triggered(self.engine.trigger_with_alert(TriggerSource::Camera).await)
    }
}
