//! Scenario orchestration for the haunted portal
//!
//! This crate owns everything that has to stay consistent under concurrent
//! triggers:
//!
//! - [`SharedRunState`]: the single locked record behind every status view
//! - [`ScenarioEngine`]: admission, the timed run sequence, and reset
//! - [`EventRouter`]: bus messages in, trigger attempts out
//! - [`StatusPublisher`]: latest-value fan-out to observers
//! - [`VisitorCounter`]: the persisted visitor count
//!
//! At most one run exists at a time. A run is admitted only when nothing is
//! running and the cooldown after the last completed run has elapsed.

mod engine;
pub mod flicker;
mod router;
mod state;
mod status;
mod visitors;
mod wait;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use engine::{ControlError, IndicatorCommand, ScenarioEngine, ScenarioSettings};
pub use router::{EventRouter, RouteOutcome};
pub use state::SharedRunState;
pub use status::StatusPublisher;
pub use visitors::{VisitorCounter, VisitorError, MAX_VISITORS_PER_ADD};
pub use wait::{hold, Hold};
