//! Indicator device states

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// State reported by the indicator device
///
/// The device speaks integer codes: 1 = idle/rotating, 2 = alert,
/// 3 = acknowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorState {
    Rotating,
    Alert,
    Acknowledge,
}

/// A state code outside the device protocol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid indicator state: {0:?}")]
pub struct InvalidIndicatorState(pub String);

impl IndicatorState {
    pub fn code(self) -> u8 {
        match self {
            IndicatorState::Rotating => 1,
            IndicatorState::Alert => 2,
            IndicatorState::Acknowledge => 3,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, InvalidIndicatorState> {
        match code {
            1 => Ok(IndicatorState::Rotating),
            2 => Ok(IndicatorState::Alert),
            3 => Ok(IndicatorState::Acknowledge),
            other => Err(InvalidIndicatorState(other.to_string())),
        }
    }
}

impl FromStr for IndicatorState {
    type Err = InvalidIndicatorState;

    /// Parse a bus payload such as `"2"` or `" 1\n"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code: i64 = s
            .trim()
            .parse()
            .map_err(|_| InvalidIndicatorState(s.to_string()))?;
        Self::from_code(code)
    }
}

impl fmt::Display for IndicatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndicatorState::Rotating => "rotating",
            IndicatorState::Alert => "alert",
            IndicatorState::Acknowledge => "acknowledge",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payloads() {
        assert_eq!("1".parse::<IndicatorState>(), Ok(IndicatorState::Rotating));
        assert_eq!(" 2\n".parse::<IndicatorState>(), Ok(IndicatorState::Alert));
        assert_eq!("3".parse::<IndicatorState>(), Ok(IndicatorState::Acknowledge));
    }

    #[test]
    fn test_reject_unknown_codes() {
        assert!("0".parse::<IndicatorState>().is_err());
        assert!("7".parse::<IndicatorState>().is_err());
        assert!("red".parse::<IndicatorState>().is_err());
        assert!("".parse::<IndicatorState>().is_err());
    }

    #[test]
    fn test_codes_match_device_protocol() {
        for state in [
            IndicatorState::Rotating,
            IndicatorState::Alert,
            IndicatorState::Acknowledge,
        ] {
            assert_eq!(IndicatorState::from_code(state.code() as i64), Ok(state));
        }
    }
}
