//! Admission verdicts

use std::fmt;
use std::time::Duration;

use crate::cooldown::display_secs;

/// Identifier of an admitted run, unique for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Outcome of an admission request
///
/// Rejection is an expected answer, not an error: the trigger is dropped and
/// never queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted(RunId),
    Rejected(Rejection),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }
}

/// Why a trigger was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadyRunning,
    CooldownActive { remaining: Duration },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::AlreadyRunning => f.write_str("Scenario is already running"),
            Rejection::CooldownActive { remaining } => {
                write!(f, "Cooldown active. Wait {:.1}s", display_secs(*remaining))
            }
        }
    }
}
