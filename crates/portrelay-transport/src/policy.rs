use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::dialer::{Dialer, Endpoint};
use crate::error::{Result, TransportError};

/// Default overall deadline for one [`dial`] call.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default pause between dial attempts inside the deadline.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// How hard [`dial`] tries before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialPolicy {
    /// Overall deadline. `None` makes exactly one attempt.
    pub timeout: Option<Duration>,
    /// Pause between attempts while the deadline has not passed.
    pub retry_interval: Duration,
}

impl Default for DialPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_DIAL_TIMEOUT),
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl DialPolicy {
    /// A policy that makes one attempt and reports its error.
    pub fn single_attempt() -> Self {
        Self {
            timeout: None,
            retry_interval: Duration::ZERO,
        }
    }
}

/// Dial `endpoint` under `policy`.
///
/// Without a timeout the dialer's error is returned as
/// [`TransportError::Connect`]. With one, failed attempts are logged and
/// retried until the deadline, which yields [`TransportError::Timeout`].
pub async fn dial<D: Dialer>(
    dialer: &D,
    endpoint: &Endpoint,
    policy: &DialPolicy,
) -> Result<D::Stream> {
    let Some(timeout) = policy.timeout else {
        return dialer
            .dial(endpoint)
            .await
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.clone(),
                source,
            });
    };

    let deadline = Instant::now()
        .checked_add(timeout)
        .unwrap_or_else(far_future);
    let mut attempts = 0u32;

    loop {
        attempts = attempts.saturating_add(1);
        match tokio::time::timeout_at(deadline, dialer.dial(endpoint)).await {
            Ok(Ok(stream)) => {
                debug!(%endpoint, attempts, "dial succeeded");
                return Ok(stream);
            }
            Ok(Err(err)) => {
                warn!(%endpoint, attempts, error = %err, "dial attempt failed");
            }
            Err(_) => break,
        }

        let next = Instant::now()
            .checked_add(policy.retry_interval)
            .map_or(deadline, |next| next.min(deadline));
        tokio::time::sleep_until(next).await;
        if Instant::now() >= deadline {
            break;
        }
    }

    Err(TransportError::Timeout {
        endpoint: endpoint.clone(),
        timeout,
        attempts,
    })
}

/// Stand-in deadline for timeouts too large to add to the current instant.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}
