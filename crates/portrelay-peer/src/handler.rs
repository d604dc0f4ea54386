//! Command handlers and the name-keyed registry the receive task consults.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use portrelay_frame::Command;
use tokio::sync::{mpsc, oneshot};

use crate::error::{PeerError, Result};

/// Help text for handlers that do not provide their own.
pub const DEFAULT_HELP: &str = "No help available.";

/// Future returned by a handler invocation.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Item on the relay channel.
pub(crate) enum Outbound {
    Command(Command),
    /// Acknowledged once every earlier item has been written.
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle to a peer's relay channel.
///
/// Everything sent through a `Relay` is written by the peer's single send
/// task, so concurrent senders never interleave partial frames.
#[derive(Clone)]
pub struct Relay {
    tx: mpsc::Sender<Outbound>,
}

impl Relay {
    pub(crate) fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self { tx }
    }

    /// Queue a command, waiting for channel capacity.
    ///
    /// Fails with [`PeerError::Closed`] once the send task is gone.
    pub async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(Outbound::Command(command))
            .await
            .map_err(|_| PeerError::Closed)
    }

    /// Wait until every command queued before this call has been written.
    pub async fn flush(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Outbound::Flush(ack))
            .await
            .map_err(|_| PeerError::Closed)?;
        done.await.map_err(|_| PeerError::Closed)
    }

    /// Whether the send task has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Reacts to one inbound command.
pub trait Handler: Send + Sync + 'static {
    /// Handle `command`. Replies go through `relay`.
    fn handle(&self, command: Command, relay: Relay) -> HandlerFuture;

    fn help(&self) -> &str {
        DEFAULT_HELP
    }
}

/// [`Handler`] backed by an async closure.
pub struct FnHandler<F> {
    func: F,
    help: Option<String>,
}

impl<F> FnHandler<F> {
    pub fn new(func: F) -> Self {
        Self { func, help: None }
    }

    /// Attach help text. An empty string keeps the default.
    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        let help = help.into();
        self.help = (!help.is_empty()).then_some(help);
        self
    }
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Command, Relay) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, command: Command, relay: Relay) -> HandlerFuture {
        Box::pin((self.func)(command, relay))
    }

    fn help(&self) -> &str {
        self.help.as_deref().unwrap_or(DEFAULT_HELP)
    }
}

/// Wrap an async closure as a [`Handler`].
pub fn handler_fn<F, Fut>(func: F) -> FnHandler<F>
where
    F: Fn(Command, Relay) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    FnHandler::new(func)
}

/// Observer run for every decoded command, with the command name.
pub(crate) type AnyMessageObserver = Arc<dyn Fn(String, Relay) -> HandlerFuture + Send + Sync>;

/// Case-insensitive map from command name to handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn Handler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler for
    /// the same name in any letter case.
    pub fn register(&self, name: &str, handler: impl Handler) {
        self.register_arc(name, Arc::new(handler));
    }

    pub fn register_arc(&self, name: &str, handler: Arc<dyn Handler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_lowercase(), handler);
    }

    /// Remove the handler for `name`, returning it if present.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name.to_lowercase())
    }

    /// Look up the handler for `name`, ignoring letter case.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_lowercase())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(name, help)` for every registered handler, sorted by name.
    pub fn help_entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, handler)| (name.clone(), handler.help().to_string()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.help_entries().into_iter().map(|(n, _)| n).collect();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .finish()
    }
}
