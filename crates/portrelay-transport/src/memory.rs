//! In-memory dialer backed by `tokio::io::duplex` pipes.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use crate::dialer::{Dialer, Endpoint};

const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

/// Dialer whose connections are in-process pipes.
///
/// Every successful dial delivers the remote half of a fresh pipe to the
/// paired [`MemoryAcceptor`]. Failures can be scripted with
/// [`MemoryDialer::fail_next`].
#[derive(Debug, Clone)]
pub struct MemoryDialer {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    capacity: usize,
    pending_failures: AtomicU32,
    attempts: AtomicU32,
    remote: mpsc::UnboundedSender<(Endpoint, DuplexStream)>,
}

/// Receiving side of a [`MemoryDialer`].
#[derive(Debug)]
pub struct MemoryAcceptor {
    incoming: mpsc::UnboundedReceiver<(Endpoint, DuplexStream)>,
}

impl MemoryDialer {
    /// Create a dialer/acceptor pair with the default pipe capacity.
    pub fn pair() -> (Self, MemoryAcceptor) {
        Self::with_capacity(DEFAULT_PIPE_CAPACITY)
    }

    /// Create a dialer/acceptor pair whose pipes buffer `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> (Self, MemoryAcceptor) {
        let (remote, incoming) = mpsc::unbounded_channel();
        let dialer = Self {
            inner: Arc::new(Inner {
                capacity,
                pending_failures: AtomicU32::new(0),
                attempts: AtomicU32::new(0),
                remote,
            }),
        };
        (dialer, MemoryAcceptor { incoming })
    }

    /// Make the next `count` dial attempts fail with `ConnectionRefused`.
    pub fn fail_next(&self, count: u32) {
        self.inner.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Total dial attempts so far, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

impl Dialer for MemoryDialer {
    type Stream = DuplexStream;

    async fn dial(&self, endpoint: &Endpoint) -> io::Result<DuplexStream> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .inner
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{endpoint} refused the connection"),
            ));
        }

        let (local, remote) = tokio::io::duplex(self.inner.capacity);
        self.inner
            .remote
            .send((endpoint.clone(), remote))
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "acceptor dropped"))?;
        Ok(local)
    }
}

impl MemoryAcceptor {
    /// Wait for the next connection. `None` once every dialer is dropped.
    pub async fn accept(&mut self) -> Option<(Endpoint, DuplexStream)> {
        self.incoming.recv().await
    }
}
