use portrelay_transport::TransportError;

/// Missing or invalid endpoint configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No host argument and no value in the role's host variable.
    #[error("no host specified (pass one or set {var})")]
    MissingHost { var: &'static str },

    /// No port argument and no value in the role's port variable.
    #[error("no port specified (pass one or set {var})")]
    MissingPort { var: &'static str },

    /// The port is not a decimal `u16`.
    #[error("invalid port {value:?}: {source}")]
    InvalidPort {
        value: String,
        source: std::num::ParseIntError,
    },
}

/// Errors that can occur in relay peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// `start` was called on a peer that is already running.
    #[error("relay peer already started")]
    AlreadyStarted,

    /// The operation needs a running peer.
    #[error("relay peer not started")]
    NotStarted,

    /// The peer was closed or its send task has ended.
    #[error("relay peer closed")]
    Closed,

    /// Endpoint configuration could not be resolved.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The transport could not be established.
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    /// Every attempt of `start_with_retry` failed to connect.
    #[error("failed to connect after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Option<TransportError>,
    },
}

impl PeerError {
    /// Whether the failure means the transport could not be established.
    ///
    /// This is the only kind `start_with_retry` retries.
    pub fn is_connection_class(&self) -> bool {
        matches!(self, PeerError::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
