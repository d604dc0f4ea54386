//! Length-prefixed command relay over persistent TCP connections.
//!
//! portrelay sends named commands with binary-safe arguments to a remote
//! endpoint and dispatches the commands it receives back to registered
//! handlers.
//!
//! # Crate Structure
//!
//! - [`frame`]: the `*<count>` / `$<length>` wire codec
//! - [`transport`]: dialers and the dial deadline policy
//! - [`peer`]: the connection manager (behind the `peer` feature)

/// Re-export frame types.
pub mod frame {
    pub use portrelay_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use portrelay_transport::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use portrelay_peer::*;
}
