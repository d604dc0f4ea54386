use std::fmt;
use std::io;

use portrelay_frame::{DecodeCause, DecodeError};
use portrelay_peer::PeerError;
use portrelay_transport::TransportError;

// Process exit codes; 64 and up follow sysexits, 124 matches timeout(1).
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn decode_error(context: &str, err: DecodeError) -> CliError {
    match err.cause {
        DecodeCause::Io(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        _ => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } => io_error(context, source),
        timeout @ TransportError::Timeout { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {timeout}"))
        }
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Config(err) => CliError::new(USAGE, format!("{context}: {err}")),
        PeerError::Connection(err) => transport_error(context, err),
        PeerError::RetriesExhausted {
            attempts,
            last: Some(last),
        } => {
            let inner = transport_error(context, last);
            CliError::new(
                inner.code,
                format!("{} (gave up after {attempts} attempts)", inner.message),
            )
        }
        PeerError::RetriesExhausted { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        PeerError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use portrelay_frame::decode_bytes;
    use portrelay_peer::ConfigError;
    use portrelay_transport::Endpoint;

    use super::*;

    #[test]
    fn malformed_frames_are_data_invalid() {
        let err = decode_bytes(b"*x\n").unwrap_err();
        assert_eq!(decode_error("decode failed", err).code, DATA_INVALID);
    }

    #[test]
    fn dial_timeout_maps_to_timeout_code() {
        let err = PeerError::RetriesExhausted {
            attempts: 2,
            last: Some(TransportError::Timeout {
                endpoint: Endpoint::new("localhost", 1),
                timeout: Duration::from_secs(1),
                attempts: 4,
            }),
        };
        let cli = peer_error("connect failed", err);
        assert_eq!(cli.code, TIMEOUT);
        assert!(cli.message.contains("gave up after 2 attempts"));
    }

    #[test]
    fn refused_connection_is_transport_error() {
        let err = PeerError::Connection(TransportError::Connect {
            endpoint: Endpoint::new("localhost", 1),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        });
        assert_eq!(peer_error("connect failed", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn configuration_errors_are_usage_errors() {
        let err = PeerError::Config(ConfigError::MissingHost {
            var: "BOT_CLIENT_HOST",
        });
        let cli = peer_error("connect failed", err);
        assert_eq!(cli.code, USAGE);
        assert!(cli.message.contains("BOT_CLIENT_HOST"));
    }
}
