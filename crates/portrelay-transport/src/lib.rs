//! Transport establishment for portrelay.
//!
//! The connection manager never opens sockets itself: it asks a [`Dialer`]
//! for a duplex byte stream to an [`Endpoint`]. [`TcpDialer`] is the
//! production implementation; [`MemoryDialer`] hands out in-memory pipes for
//! deterministic tests.
//!
//! [`dial`] wraps a single dialer call in a [`DialPolicy`]: an overall
//! deadline with a pause between attempts.

pub mod dialer;
pub mod error;
pub mod memory;
pub mod policy;

pub use dialer::{Dialer, Endpoint, TcpDialer};
pub use error::{Result, TransportError};
pub use memory::{MemoryAcceptor, MemoryDialer};
pub use policy::{dial, DialPolicy, DEFAULT_DIAL_TIMEOUT, DEFAULT_RETRY_INTERVAL};
