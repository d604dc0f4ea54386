//! Peer configuration and endpoint resolution.
//!
//! Host and port resolve in a fixed order: the explicit value, then the
//! role's environment variable, then a [`ConfigError`].
//!
//! | Role   | Host variable     | Port variable     |
//! |--------|-------------------|-------------------|
//! | Client | `BOT_CLIENT_HOST` | `BOT_CLIENT_PORT` |
//! | Server | `BOT_SERVER_HOST` | `BOT_SERVER_PORT` |

use std::fmt;
use std::time::Duration;

use portrelay_frame::CodecConfig;
use portrelay_transport::{DialPolicy, Endpoint};

use crate::error::ConfigError;

/// Default relay channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Default bound on concurrently running handlers.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 256;

/// Which side of the relay this process plays. Selects the environment
/// variables used as endpoint fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    #[default]
    Client,
    Server,
}

impl Role {
    pub fn host_var(self) -> &'static str {
        match self {
            Role::Client => "BOT_CLIENT_HOST",
            Role::Server => "BOT_SERVER_HOST",
        }
    }

    pub fn port_var(self) -> &'static str {
        match self {
            Role::Client => "BOT_CLIENT_PORT",
            Role::Server => "BOT_SERVER_PORT",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host/port as given by the caller, before environment fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointConfig {
    pub role: Role,
    pub host: Option<String>,
    pub port: Option<String>,
}

impl EndpointConfig {
    /// Build from raw arguments; empty strings count as "not given".
    pub fn from_args(role: Role, host: &str, port: &str) -> Self {
        Self {
            role,
            host: non_empty(host),
            port: non_empty(port),
        }
    }

    /// Resolve against the process environment.
    pub fn resolve(&self) -> Result<Endpoint, ConfigError> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve with an explicit variable lookup.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<Endpoint, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host_var = self.role.host_var();
        let port_var = self.role.port_var();

        let host = self
            .host
            .clone()
            .or_else(|| lookup(host_var).filter(|v| !v.is_empty()))
            .ok_or(ConfigError::MissingHost { var: host_var })?;
        let port = self
            .port
            .clone()
            .or_else(|| lookup(port_var).filter(|v| !v.is_empty()))
            .ok_or(ConfigError::MissingPort { var: port_var })?;

        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|source| ConfigError::InvalidPort {
                value: port.clone(),
                source,
            })?;

        Ok(Endpoint::new(host, port))
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Relay peer behavior.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Selects the environment fallback variables.
    pub role: Role,
    /// Deadline and retry interval for a single `start`.
    pub dial: DialPolicy,
    /// Relay channel capacity (at least 1).
    pub channel_capacity: usize,
    /// Handlers allowed to run at once (at least 1).
    pub max_concurrent_handlers: usize,
    /// Pause between `start_with_retry` attempts.
    pub retry_backoff: Duration,
    /// Frame limits for inbound commands.
    pub codec: CodecConfig,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            role: Role::Client,
            dial: DialPolicy::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
            retry_backoff: Duration::ZERO,
            codec: CodecConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_values_win_over_environment() {
        let cfg = EndpointConfig::from_args(Role::Client, "example.org", "7000");
        let endpoint = cfg
            .resolve_with(env(&[("BOT_CLIENT_HOST", "other"), ("BOT_CLIENT_PORT", "1")]))
            .unwrap();
        assert_eq!(endpoint, Endpoint::new("example.org", 7000));
    }

    #[test]
    fn empty_arguments_fall_back_to_role_variables() {
        let client = EndpointConfig::from_args(Role::Client, "", "");
        let server = EndpointConfig::from_args(Role::Server, "", "");
        let lookup = env(&[
            ("BOT_CLIENT_HOST", "client.local"),
            ("BOT_CLIENT_PORT", "7001"),
            ("BOT_SERVER_HOST", "server.local"),
            ("BOT_SERVER_PORT", "7002"),
        ]);

        assert_eq!(
            client.resolve_with(&lookup).unwrap(),
            Endpoint::new("client.local", 7001)
        );
        assert_eq!(
            server.resolve_with(&lookup).unwrap(),
            Endpoint::new("server.local", 7002)
        );
    }

    #[test]
    fn missing_values_name_the_variable() {
        let cfg = EndpointConfig::from_args(Role::Server, "", "9000");
        let err = cfg.resolve_with(env(&[])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingHost {
                var: "BOT_SERVER_HOST"
            }
        ));

        let cfg = EndpointConfig::from_args(Role::Client, "localhost", "");
        let err = cfg
            .resolve_with(env(&[("BOT_CLIENT_PORT", "")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingPort {
                var: "BOT_CLIENT_PORT"
            }
        ));
    }

    #[test]
    fn port_must_fit_u16() {
        for bad in ["http", "70000", "-1"] {
            let cfg = EndpointConfig::from_args(Role::Client, "localhost", bad);
            let err = cfg.resolve_with(env(&[])).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidPort { ref value, .. } if value == bad),
                "{bad}"
            );
        }
    }

    #[test]
    fn defaults() {
        let cfg = PeerConfig::default();
        assert_eq!(cfg.role, Role::Client);
        assert_eq!(cfg.channel_capacity, 64);
        assert_eq!(cfg.max_concurrent_handlers, 256);
        assert_eq!(cfg.retry_backoff, Duration::ZERO);
        assert_eq!(Role::Server.to_string(), "server");
    }
}
