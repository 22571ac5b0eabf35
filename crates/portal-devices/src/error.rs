//! Device client errors

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for device requests
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors raised by a single device request
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Transport failure, including timeouts
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Device answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    /// Device answered with a body we do not understand
    #[error("unexpected response from {url}: {reason}")]
    UnexpectedBody { url: String, reason: String },
}
