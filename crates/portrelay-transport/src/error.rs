use std::time::Duration;

use crate::dialer::Endpoint;

/// Errors that can occur while establishing a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The dialer failed to open a stream.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        source: std::io::Error,
    },

    /// No dial attempt succeeded before the deadline.
    #[error("timed out connecting to {endpoint} after {timeout:?} ({attempts} attempts)")]
    Timeout {
        endpoint: Endpoint,
        timeout: Duration,
        attempts: u32,
    },
}

impl TransportError {
    /// The endpoint the failed dial was aimed at.
    pub fn endpoint(&self) -> &Endpoint {
        match self {
            TransportError::Connect { endpoint, .. } | TransportError::Timeout { endpoint, .. } => {
                endpoint
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
