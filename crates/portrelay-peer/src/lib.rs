//! Connection management for portrelay.
//!
//! [`RelayPeer`] owns one connection to a remote endpoint. Outbound commands
//! pass through a bounded relay channel to a single send task; a receive task
//! decodes inbound commands and dispatches each one to the handler registered
//! for its name.

pub mod config;
pub mod error;
pub mod handler;
pub mod peer;

pub use config::{
    EndpointConfig, PeerConfig, Role, DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_CONCURRENT_HANDLERS,
};
pub use error::{ConfigError, PeerError, Result};
pub use handler::{
    handler_fn, FnHandler, Handler, HandlerFuture, HandlerRegistry, Relay, DEFAULT_HELP,
};
pub use peer::RelayPeer;
