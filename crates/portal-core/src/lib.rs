//! Core types for the haunted portal controller
//!
//! This crate provides the fundamental types shared by the scenario engine,
//! the device clients and the API: trigger sources, indicator states, the
//! admission verdict, the published status snapshot and the cooldown gate.

mod admission;
pub mod cooldown;
mod indicator;
mod status;
mod trigger;

pub use admission::{Admission, Rejection, RunId};
pub use indicator::{IndicatorState, InvalidIndicatorState};
pub use status::{BusMessage, RunOutcome, RunPhase, ScenarioState, StatusSnapshot};
pub use trigger::TriggerSource;
