//! Actuator clients for the portal controller
//!
//! Two remote devices take part in a scenario:
//!
//! - the **indicator** (an ESP32 RGB portal) with alert / acknowledge / reset
//!   commands and a state query
//! - the **lighting** controller (Home Assistant) with scene presets and
//!   per-light brightness
//!
//! Both are reached over short, timeout-bound HTTP requests. Trait methods
//! report success as a `bool`: a failed call is logged here and reported as
//! `false`, and the scenario moves on to its next step.

mod error;
mod indicator;
mod lighting;

pub use error::{DeviceError, DeviceResult};
pub use indicator::{HttpIndicator, IndicatorActuator, IndicatorReport};
pub use lighting::{HomeAssistantLighting, LightingActuator};
