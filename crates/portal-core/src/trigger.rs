//! Trigger sources

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an admission request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// HTTP trigger endpoint
    Manual,
    /// Person detection reported on the presence topic
    Camera,
    /// The indicator reported it was switched to alert on its own
    ExternalState,
}

impl TriggerSource {
    /// Whether the source is gated by the auto-trigger switch
    pub fn is_automatic(self) -> bool {
        !matches!(self, TriggerSource::Manual)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Manual => "manual",
            TriggerSource::Camera => "camera",
            TriggerSource::ExternalState => "external-state",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_manual_bypasses_auto_trigger() {
        assert!(!TriggerSource::Manual.is_automatic());
        assert!(TriggerSource::Camera.is_automatic());
        assert!(TriggerSource::ExternalState.is_automatic());
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_value(TriggerSource::ExternalState).unwrap(),
            "external_state"
        );
        assert_eq!(TriggerSource::ExternalState.to_string(), "external-state");
    }
}
