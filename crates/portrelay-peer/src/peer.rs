use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures_util::{SinkExt, StreamExt};
use portrelay_frame::{Command, CommandCodec};
use portrelay_transport::{Dialer, TcpDialer};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{EndpointConfig, PeerConfig};
use crate::error::{PeerError, Result};
use crate::handler::{
    AnyMessageObserver, Handler, HandlerFuture, HandlerRegistry, Outbound, Relay,
};

/// One connection to a remote relay endpoint.
///
/// A peer owns exactly one transport. `start` dials it and spawns two tasks:
/// the send task drains the relay channel into the connection, the receive
/// task decodes inbound commands and dispatches them to handlers. A peer
/// cannot be restarted after [`RelayPeer::close`]; build a new one.
pub struct RelayPeer<D = TcpDialer> {
    dialer: D,
    config: PeerConfig,
    dispatch: Dispatch,
    state: Mutex<State>,
}

enum State {
    Idle,
    Starting,
    Running(Session),
    Closed,
}

struct Session {
    relay: Relay,
    cancel: CancellationToken,
    disconnected: CancellationToken,
    send_task: JoinHandle<()>,
    recv_task: JoinHandle<()>,
}

/// Routing targets shared with the receive task, so registrations made after
/// `start` still apply.
#[derive(Clone, Default)]
struct Dispatch {
    handlers: HandlerRegistry,
    unhandled: Arc<RwLock<Option<Arc<dyn Handler>>>>,
    any_message: Arc<RwLock<Option<AnyMessageObserver>>>,
}

impl Dispatch {
    fn route(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).or_else(|| {
            self.unhandled
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    fn observer(&self) -> Option<AnyMessageObserver> {
        self.any_message
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RelayPeer<TcpDialer> {
    /// Create a TCP peer.
    pub fn new(config: PeerConfig) -> Self {
        Self::with_dialer(TcpDialer, config)
    }
}

impl Default for RelayPeer<TcpDialer> {
    fn default() -> Self {
        Self::new(PeerConfig::default())
    }
}

impl<D: Dialer> RelayPeer<D> {
    /// Create a peer that establishes its transport through `dialer`.
    pub fn with_dialer(dialer: D, config: PeerConfig) -> Self {
        Self {
            dialer,
            config,
            dispatch: Dispatch::default(),
            state: Mutex::new(State::Idle),
        }
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    /// Connect and launch the send and receive tasks.
    ///
    /// Empty `host` or `port` fall back to the role's environment variables.
    /// Returns once the tasks are spawned.
    ///
    /// # Errors
    ///
    /// - [`PeerError::AlreadyStarted`] / [`PeerError::Closed`] for a peer
    ///   that is running, starting or closed. Nothing else is touched.
    /// - [`PeerError::Config`] when host or port cannot be resolved.
    /// - [`PeerError::Connection`] when the dial fails under the dial policy.
    pub async fn start(&self, host: &str, port: &str) -> Result<()> {
        let mut guard = StartGuard::begin(&self.state)?;

        let endpoint = EndpointConfig::from_args(self.config.role, host, port).resolve()?;
        debug!(%endpoint, role = %self.config.role, "dialing relay endpoint");
        let stream = portrelay_transport::dial(&self.dialer, &endpoint, &self.config.dial).await?;

        let mut state = lock(&self.state);
        if !matches!(*state, State::Starting) {
            // Closed while dialing; the stream is dropped here.
            guard.disarm();
            return Err(PeerError::Closed);
        }
        *state = State::Running(self.launch(stream));
        guard.disarm();
        info!(%endpoint, "relay peer connected");
        Ok(())
    }

    /// Call [`start`](Self::start) up to `max_attempts` times.
    ///
    /// Only connection-class failures are retried, each logged with its
    /// attempt number. Any other failure is returned immediately.
    ///
    /// # Errors
    ///
    /// [`PeerError::RetriesExhausted`] carrying the last connection failure
    /// once every attempt has failed.
    pub async fn start_with_retry(&self, host: &str, port: &str, max_attempts: u32) -> Result<()> {
        let mut last = None;

        for attempt in 1..=max_attempts {
            match self.start(host, port).await {
                Ok(()) => return Ok(()),
                Err(PeerError::Connection(cause)) => {
                    warn!(attempt, max_attempts, error = %cause, "connection attempt failed");
                    last = Some(cause);
                    if attempt < max_attempts && !self.config.retry_backoff.is_zero() {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(PeerError::RetriesExhausted {
            attempts: max_attempts,
            last,
        })
    }

    fn launch(&self, stream: D::Stream) -> Session {
        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let relay = Relay::new(tx);
        let cancel = CancellationToken::new();
        let disconnected = CancellationToken::new();

        let send_task = tokio::spawn(run_sender(
            FramedWrite::new(write_half, CommandCodec::new()),
            rx,
            cancel.clone(),
        ));

        let receiver = Receiver {
            dispatch: self.dispatch.clone(),
            relay: relay.clone(),
            limit: Arc::new(Semaphore::new(self.config.max_concurrent_handlers.max(1))),
            cancel: cancel.clone(),
        };
        let frames = FramedRead::new(
            read_half,
            CommandCodec::with_config(self.config.codec.clone()),
        );
        let recv_task = tokio::spawn(receiver.run(frames, disconnected.clone()));

        Session {
            relay,
            cancel,
            disconnected,
            send_task,
            recv_task,
        }
    }
}

impl<D> RelayPeer<D> {
    /// Queue `command` for the send task.
    ///
    /// Waits until the relay channel has capacity. Commands from one caller
    /// are written in call order.
    ///
    /// # Errors
    ///
    /// [`PeerError::NotStarted`] before `start`, [`PeerError::Closed`] after
    /// `close` or once the send task has stopped.
    pub async fn send_message(&self, command: Command) -> Result<()> {
        self.relay()?.send(command).await
    }

    /// Wait until every command queued so far has been written.
    ///
    /// # Errors
    ///
    /// Same as [`send_message`](Self::send_message).
    pub async fn flush(&self) -> Result<()> {
        self.relay()?.flush().await
    }

    /// Cloneable handle to the relay channel of the running session.
    pub fn relay(&self) -> Result<Relay> {
        match &*lock(&self.state) {
            State::Running(session) => Ok(session.relay.clone()),
            State::Closed => Err(PeerError::Closed),
            State::Idle | State::Starting => Err(PeerError::NotStarted),
        }
    }

    /// Register `handler` for `name`, case-insensitively. Replaces any
    /// existing handler for that name.
    pub fn register_handler(&self, name: &str, handler: impl Handler) {
        self.dispatch.handlers.register(name, handler);
    }

    /// Handler for commands with no registered handler.
    pub fn on_unhandled(&self, handler: impl Handler) {
        *self
            .dispatch
            .unhandled
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Observer run with the name of every decoded command, whether or not a
    /// handler matched.
    pub fn on_any_message<F, Fut>(&self, observer: F)
    where
        F: Fn(String, Relay) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let wrapped: AnyMessageObserver =
            Arc::new(move |name: String, relay: Relay| -> HandlerFuture {
                Box::pin(observer(name, relay))
            });
        *self
            .dispatch
            .any_message
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(wrapped);
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.dispatch.handlers
    }

    /// Whether the receive task of a running session is still reading.
    pub fn is_connected(&self) -> bool {
        match &*lock(&self.state) {
            State::Running(session) => !session.disconnected.is_cancelled(),
            _ => false,
        }
    }

    /// Resolves once the receive task has ended (remote close, decode
    /// failure or `close`).
    pub async fn wait_for_disconnect(&self) -> Result<()> {
        let disconnected = match &*lock(&self.state) {
            State::Running(session) => session.disconnected.clone(),
            State::Closed => return Ok(()),
            State::Idle | State::Starting => return Err(PeerError::NotStarted),
        };
        disconnected.cancelled().await;
        Ok(())
    }

    /// Stop both tasks and release the transport.
    ///
    /// Idempotent. The peer stays closed afterwards.
    pub async fn close(&self) {
        let previous = std::mem::replace(&mut *lock(&self.state), State::Closed);
        if let State::Running(session) = previous {
            session.shutdown().await;
            info!("relay peer closed");
        }
    }
}

impl<D> Drop for RelayPeer<D> {
    fn drop(&mut self) {
        if let State::Running(session) = &*lock(&self.state) {
            session.cancel.cancel();
        }
    }
}

impl Session {
    async fn shutdown(self) {
        self.cancel.cancel();
        for (task, name) in [(self.send_task, "send"), (self.recv_task, "receive")] {
            if let Err(err) = task.await {
                warn!(task = name, error = %err, "relay task ended abnormally");
            }
        }
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the `Starting` slot; a failed or dropped `start` reverts to `Idle`.
struct StartGuard<'a> {
    state: &'a Mutex<State>,
    armed: bool,
}

impl<'a> StartGuard<'a> {
    fn begin(state: &'a Mutex<State>) -> Result<Self> {
        let mut current = lock(state);
        match *current {
            State::Idle => {
                *current = State::Starting;
                Ok(Self { state, armed: true })
            }
            State::Starting | State::Running(_) => Err(PeerError::AlreadyStarted),
            State::Closed => Err(PeerError::Closed),
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut current = lock(self.state);
        if matches!(*current, State::Starting) {
            *current = State::Idle;
        }
    }
}

async fn run_sender<W>(
    mut sink: FramedWrite<W, CommandCodec>,
    mut rx: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    debug!("send task started");
    loop {
        let command = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(Outbound::Command(command)) => command,
                Some(Outbound::Flush(ack)) => {
                    let _ = ack.send(());
                    continue;
                }
                None => break,
            },
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = sink.send(command) => {
                if let Err(err) = result {
                    warn!(error = %err, "write failed, send task stopping");
                    break;
                }
            }
        }
    }
    rx.close();
    debug!("send task stopped");
}

struct Receiver {
    dispatch: Dispatch,
    relay: Relay,
    limit: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl Receiver {
    async fn run<R>(self, mut frames: FramedRead<R, CommandCodec>, disconnected: CancellationToken)
    where
        R: AsyncRead + Unpin,
    {
        let _disconnected = disconnected.drop_guard();
        debug!("receive task started");

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                next = frames.next() => next,
            };

            let command = match next {
                Some(Ok(command)) => command,
                Some(Err(err)) => {
                    warn!(error = %err, "decode failed, receive task stopping");
                    break;
                }
                None => {
                    debug!("remote closed the connection");
                    break;
                }
            };

            if !self.dispatch_command(command).await {
                break;
            }
        }
        debug!("receive task stopped");
    }

    /// Spawn the handler and observer for `command`. Returns `false` if
    /// cancelled while waiting for dispatch capacity.
    async fn dispatch_command(&self, command: Command) -> bool {
        let name = command.name().to_string();
        let observer = self.dispatch.observer();

        match self.dispatch.route(&name) {
            Some(handler) => {
                debug!(command = %name, "dispatching command");
                let future = handler.handle(command, self.relay.clone());
                if !self.spawn_limited(future).await {
                    return false;
                }
            }
            None => debug!(command = %name, "no handler for command"),
        }

        if let Some(observer) = observer {
            let future = observer(name, self.relay.clone());
            if !self.spawn_limited(future).await {
                return false;
            }
        }
        true
    }

    async fn spawn_limited(&self, future: HandlerFuture) -> bool {
        let Some(permit) = self.acquire().await else {
            return false;
        };
        tokio::spawn(async move {
            let _permit = permit;
            future.await;
        });
        true
    }

    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            permit = Arc::clone(&self.limit).acquire_owned() => permit.ok(),
        }
    }
}
