//! Connection manager, the public surface of the crate.
//!
//! A [ConnectionManager] is a cheap cloneable handle to a control task. The task owns the
//! transport, the outbound queue and every timer, and processes handle requests and
//! transport notifications one at a time, so at most one transport is alive and queued
//! messages keep their order.

mod command;
mod dispatch;
mod heartbeat;
mod machine;
mod queue;
mod state;


pub use state::ConnectionState;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use snafu::prelude::*;
use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    event::{Event, EventKind, EventStream, Listener, ListenerId},
    message::OutboundMessage,
    transport::{Connector, OpenError, WebsocketConnector},
    Config, Result,
};
use command::Command;
use machine::Machine;
use state::Snapshot;

/// Error of a [connect](ConnectionManager::connect) call
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum ConnectError {
    /// transport open failed, the manager keeps reconnecting in background
    #[snafu(display("open transport failed: {source}"))]
    OpenFailed {
        /// source error
        source: Arc<OpenError>,
    },

    /// [disconnect](ConnectionManager::disconnect) called before the open finished
    #[snafu(display("connect aborted by disconnect"))]
    Aborted,

    /// control task is gone
    #[snafu(display("connection manager stopped"))]
    ManagerStopped,
}

/// Persistent connection to a task event backend.
///
/// Must be created inside a tokio runtime, the control task is spawned on it.
/// The control task stops once every clone of the handle is dropped.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<Snapshot>,
    next_listener: Arc<AtomicU64>,
}

impl ConnectionManager {
    /// Create a manager using websocket transport
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, WebsocketConnector)
    }

    /// Create a manager from a url with default config
    pub fn from_url<S: AsRef<str> + ?Sized>(url: &S) -> Result<Self> {
        let config = Config::builder(url)
            .build()
            .context(crate::error::InvalidConfig)?;

        Ok(Self::new(config))
    }

    /// Create a manager using a custom transport connector
    pub fn with_connector<C: Connector>(config: Config, connector: C) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(Snapshot::default());

        log::debug!("Create connection manager for {}", config.url);

        let machine = Machine::new(config, Arc::new(connector), commands_rx, snapshot_tx);
        tokio::spawn(machine.run());

        Self {
            commands,
            snapshot,
            next_listener: Arc::new(AtomicU64::new(1)),
        }
    }

    fn command(&self, command: Command) -> bool {
        if self.commands.send(command).is_err() {
            log::warn!("Control task stopped, command dropped");
            return false;
        }
        true
    }

    /// Open the connection, optionally bound to a task.
    ///
    /// Resolves once the transport opened, or with an error if this open attempt failed.
    /// Calling it while a transport is open or opening does nothing.
    pub async fn connect(&self, task_id: Option<&str>) -> Result<()> {
        let (reply, rx) = oneshot::channel();

        self.command(Command::Connect {
            task_id: task_id.map(str::to_string),
            reply,
        });

        let result = match rx.await {
            Ok(result) => result,
            Err(_) => error::ManagerStopped.fail(),
        };

        result.context(crate::error::ConnectFailed)
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Pending reconnect and heartbeat timers are cancelled when this returns.
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();

        if self.command(Command::Disconnect { reply }) {
            let _ = rx.await;
        }
    }

    /// Send a message, it is queued while the link is down
    pub fn send(&self, message: OutboundMessage) {
        self.command(Command::Send(message.stamp()));
    }

    /// Start following a task
    pub fn subscribe(&self, task_id: &str) {
        self.command(Command::Subscribe(task_id.to_string()));
    }

    /// Stop following a task
    pub fn unsubscribe(&self, task_id: &str) {
        self.command(Command::Unsubscribe(task_id.to_string()));
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.snapshot.borrow().state
    }

    /// Task the connection is bound to
    pub fn current_task_id(&self) -> Option<String> {
        self.snapshot.borrow().task_id.clone()
    }

    /// Reconnect attempts since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.snapshot.borrow().reconnect_attempts
    }

    /// Messages waiting for the link
    pub fn queued_messages(&self) -> usize {
        self.snapshot.borrow().queued
    }

    /// Check if a reconnect or heartbeat timer is scheduled
    pub fn has_pending_timers(&self) -> bool {
        let snapshot = self.snapshot.borrow();
        snapshot.reconnect_pending || snapshot.heartbeat_active
    }

    fn listen(&self, kind: Option<EventKind>, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.command(Command::Listen { id, kind, listener });
        id
    }

    /// Register a handler for one kind of event.
    ///
    /// Handlers run on the control task in registration order, keep them short.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listen(Some(kind), Listener::Callback(Arc::new(handler)))
    }

    /// Remove a registered handler
    pub fn off(&self, id: ListenerId) {
        self.command(Command::Unlisten(id));
    }

    /// Stream of every event emitted after this call
    pub fn events(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listen(None, Listener::Channel(tx));
        EventStream { rx }
    }
}
