//! Flicker choreography
//!
//! One round is a fixed sequence of brightness steps on a single light.
//! Brightness 0 means "turn off" rather than "turn on at 0".

use portal_devices::LightingActuator;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::wait::{hold, Hold};

/// One step of a flicker round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlickerStep {
    pub brightness: u8,
    pub hold: Duration,
}

const fn step(brightness: u8, hold_ms: u64) -> FlickerStep {
    FlickerStep {
        brightness,
        hold: Duration::from_millis(hold_ms),
    }
}

/// The round played by the entrance light
pub const FLICKER_PATTERN: &[FlickerStep] = &[
    step(10, 300),
    step(0, 3_000),
    step(200, 300),
    step(0, 2_500),
    step(150, 300),
    step(50, 300),
    step(0, 3_500),
    step(70, 300),
    step(200, 400),
    step(70, 300),
    step(0, 1_500),
    step(200, 400),
    step(0, 3_000),
    step(70, 300),
    step(0, 3_000),
    step(250, 200),
    step(0, 1_000),
    step(70, 1_000),
];

/// Total hold time of one round
pub fn round_duration() -> Duration {
    FLICKER_PATTERN.iter().map(|s| s.hold).sum()
}

/// Play `rounds` rounds of the pattern on `entity`
///
/// Stops between steps as soon as `token` is cancelled. Failed light calls
/// are already logged by the client; the pattern keeps going.
pub async fn run_flicker(
    lighting: &dyn LightingActuator,
    entity: &str,
    rounds: u32,
    token: &CancellationToken,
) -> Hold {
    for round in 1..=rounds {
        debug!(round, rounds, "Flicker round");
        for step in FLICKER_PATTERN {
            if token.is_cancelled() {
                return Hold::Aborted;
            }
            if step.brightness == 0 {
                lighting.turn_off(entity).await;
            } else {
                lighting.set_brightness(entity, step.brightness).await;
            }
            if hold(step.hold, token).await.is_aborted() {
                return Hold::Aborted;
            }
        }
    }
    Hold::Elapsed
}
