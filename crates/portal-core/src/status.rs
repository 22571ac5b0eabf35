//! Published run status
//!
//! `StatusSnapshot` is the record fanned out to web and websocket observers
//! after every state-affecting operation. It is a copy taken under the run
//! state lock; nothing in it is live.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indicator::IndicatorState;
use crate::trigger::TriggerSource;

/// Coarse scenario state shown to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioState {
    /// A run is executing
    Active,
    /// No run, cooldown still counting down
    Cooldown,
    /// Ready for a trigger
    Waiting,
}

/// Step of the choreography a run is currently executing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    IndicatorAlert,
    LightsOff,
    Flicker,
    LightsOn,
    DegradedWait,
    IndicatorReset,
}

/// How a run terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Aborted,
}

/// Last message seen on the bus, kept for debugging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

/// Snapshot of the controller status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub scenario_running: bool,
    pub scenario_state: ScenarioState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<RunPhase>,
    pub abort_requested: bool,
    pub auto_trigger_enabled: bool,
    /// Seconds, rounded to one decimal for display
    pub cooldown_remaining: f64,
    pub last_trigger_time: Option<DateTime<Utc>>,
    pub last_trigger_source: Option<TriggerSource>,
    pub last_outcome: Option<RunOutcome>,
    pub total_triggers: u64,
    pub last_person_count: u32,
    pub indicator_state: Option<IndicatorState>,
    pub indicator_last_update: Option<DateTime<Utc>>,
    pub indicator_online: bool,
    pub lighting_available: bool,
    pub bus_connected: bool,
    pub last_bus_message: Option<BusMessage>,
    pub visitor_count: u64,
    pub uptime_start: DateTime<Utc>,
}
