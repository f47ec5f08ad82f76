use std::{fmt::Debug, pin::Pin, sync::Arc, time::Duration};

use futures_util::{future, future::BoxFuture, SinkExt, StreamExt};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::Sleep,
};
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};

use super::{
    command::Command,
    dispatch::{dispatch, Dispatch},
    heartbeat::Heartbeat,
    queue::OutboundQueue,
    state::Snapshot,
    ConnectError, ConnectionState,
};
use crate::{
    backoff,
    event::{CloseInfo, ErrorEvent, Event, Listeners, CLOSE_NORMAL},
    message::{ControlAction, Envelope},
    transport::{self, BoxTransport, Connector, Frame, OpenError, WebsocketError},
    Config,
};

const DISCONNECT_REASON: &str = "client disconnect";

/// Upper bound for close handshake writes
pub(crate) const CLOSE_TIMEOUT: Duration = Duration::from_secs(3);

type Opening = BoxFuture<'static, Result<BoxTransport, OpenError>>;

enum Signal {
    Command(Command),
    Stop,
    Opened(Result<BoxTransport, OpenError>),
    Frame(Option<Result<Frame, WebsocketError>>),
    Heartbeat,
    ReconnectDue,
}

/// The control task, sole owner of transport, queue and timers
pub(crate) struct Machine {
    config: Config,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    snapshot: watch::Sender<Snapshot>,
    listeners: Listeners,
    queue: OutboundQueue,
    heartbeat: Heartbeat,

    state: ConnectionState,
    task_id: Option<String>,
    attempts: u32,
    intentional: bool,

    transport: Option<BoxTransport>,
    opening: Option<Opening>,
    connect_reply: Option<oneshot::Sender<Result<(), ConnectError>>>,
    reconnect: Option<Pin<Box<Sleep>>>,
}

impl Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("url", &self.config.url.as_str())
            .field("state", &self.state)
            .field("task_id", &self.task_id)
            .field("attempts", &self.attempts)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

async fn wait_open(opening: &mut Option<Opening>) -> Result<BoxTransport, OpenError> {
    match opening.as_mut() {
        Some(fut) => fut.await,
        None => future::pending().await,
    }
}

async fn read(transport: &mut Option<BoxTransport>) -> Option<Result<Frame, WebsocketError>> {
    match transport.as_mut() {
        Some(t) => t.next().await,
        None => future::pending().await,
    }
}

async fn wait_reconnect(reconnect: &mut Option<Pin<Box<Sleep>>>) {
    match reconnect.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}

/// Write `farewell` if any, then flush and close, giving up after [CLOSE_TIMEOUT]
async fn shutdown(mut transport: BoxTransport, farewell: Option<Frame>) {
    let closing = async {
        if let Some(frame) = farewell {
            if let Err(err) = transport.send(frame).await {
                log::debug!("Send close frame failed: {}", err);
            }
        }
        transport.close().await
    };

    match tokio::time::timeout(CLOSE_TIMEOUT, closing).await {
        Ok(Ok(())) => log::trace!("Transport closed"),
        Ok(Err(err)) => log::debug!("Close transport failed: {}", err),
        Err(_) => log::warn!("Close transport timeout after {:?}, drop it", CLOSE_TIMEOUT),
    }
}

impl Machine {
    pub fn new(
        config: Config,
        connector: Arc<dyn Connector>,
        commands: mpsc::UnboundedReceiver<Command>,
        snapshot: watch::Sender<Snapshot>,
    ) -> Self {
        let heartbeat = Heartbeat::new(config.heartbeat_interval);

        Self {
            config,
            connector,
            commands,
            snapshot,
            listeners: Listeners::default(),
            queue: OutboundQueue::default(),
            heartbeat,
            state: ConnectionState::Disconnected,
            task_id: None,
            attempts: 0,
            intentional: false,
            transport: None,
            opening: None,
            connect_reply: None,
            reconnect: None,
        }
    }

    pub async fn run(mut self) {
        log::debug!("Control task start: {:?}", self);

        loop {
            match self.next_signal().await {
                Signal::Stop => {
                    self.teardown().await;
                    break;
                }
                Signal::Command(command) => self.on_command(command).await,
                Signal::Opened(result) => self.on_opened(result).await,
                Signal::Frame(item) => self.on_frame(item).await,
                Signal::Heartbeat => self.on_heartbeat().await,
                Signal::ReconnectDue => self.on_reconnect_due(),
            }

            self.publish();
        }

        self.publish();
        log::debug!("Control task stopped");
    }

    async fn next_signal(&mut self) -> Signal {
        tokio::select! {
            biased;

            command = self.commands.recv() => match command {
                Some(command) => Signal::Command(command),
                None => Signal::Stop,
            },

            result = wait_open(&mut self.opening) => Signal::Opened(result),

            item = read(&mut self.transport) => Signal::Frame(item),

            _ = self.heartbeat.tick() => Signal::Heartbeat,

            _ = wait_reconnect(&mut self.reconnect) => Signal::ReconnectDue,
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(Snapshot {
            state: self.state,
            task_id: self.task_id.clone(),
            reconnect_attempts: self.attempts,
            reconnect_pending: self.reconnect.is_some(),
            heartbeat_active: self.heartbeat.is_active(),
            queued: self.queue.len(),
        });
    }

    fn emit(&mut self, event: Event) {
        self.listeners.emit(&event);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }

        log::debug!("State {} -> {}", self.state, state);

        self.state = state;
        self.publish();
        self.emit(Event::StateChange(state));
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect { task_id, reply } => self.connect(task_id, reply),
            Command::Disconnect { reply } => {
                self.disconnect().await;
                self.publish();
                let _ = reply.send(());
            }
            Command::Send(envelope) => self.deliver(envelope).await,
            Command::Subscribe(task_id) => {
                log::debug!("Subscribe task {}", task_id);
                let envelope = Envelope::control(ControlAction::Subscribe, &task_id);
                self.task_id = Some(task_id);
                self.deliver(envelope).await;
            }
            Command::Unsubscribe(task_id) => {
                log::debug!("Unsubscribe task {}", task_id);
                if self.task_id.as_deref() == Some(task_id.as_str()) {
                    self.task_id = None;
                }
                let envelope = Envelope::control(ControlAction::Unsubscribe, &task_id);
                self.deliver(envelope).await;
            }
            Command::Listen { id, kind, listener } => self.listeners.add(id, kind, listener),
            Command::Unlisten(id) => {
                if !self.listeners.remove(id) {
                    log::debug!("Listener {:?} not found", id);
                }
            }
        }
    }

    fn connect(
        &mut self,
        task_id: Option<String>,
        reply: oneshot::Sender<Result<(), ConnectError>>,
    ) {
        if self.transport.is_some() || self.opening.is_some() {
            log::warn!(
                "Connect called while transport is {}, ignored",
                if self.transport.is_some() {
                    "open"
                } else {
                    "opening"
                }
            );
            let _ = reply.send(Ok(()));
            return;
        }

        self.intentional = false;
        self.cancel_reconnect();
        self.attempts = 0;
        if task_id.is_some() {
            self.task_id = task_id;
        }
        self.connect_reply = Some(reply);

        self.start_open();
    }

    fn start_open(&mut self) {
        log::debug!("Opening transport to {}", self.config.url);

        self.opening = Some(transport::open(
            Arc::clone(&self.connector),
            self.config.url.clone(),
            self.config.open_timeout,
        ));
        self.set_state(ConnectionState::Connecting);
    }

    async fn on_opened(&mut self, result: Result<BoxTransport, OpenError>) {
        self.opening = None;

        match result {
            Ok(transport) => {
                log::info!("Connected to {}", self.config.url);

                self.transport = Some(transport);
                self.attempts = 0;
                self.set_state(ConnectionState::Connected);

                self.flush().await;
                self.heartbeat.start();
                self.emit(Event::Connected);

                if let Some(reply) = self.connect_reply.take() {
                    self.publish();
                    let _ = reply.send(Ok(()));
                }
            }
            Err(err) => {
                log::warn!("Open transport failed: {}", err);

                let reason = err.to_string();
                let err = Arc::new(err);

                self.set_state(ConnectionState::Error);
                self.emit(Event::Error(ErrorEvent::Transport(err.clone())));
                self.handle_close(CloseInfo::abnormal(reason));

                if let Some(reply) = self.connect_reply.take() {
                    self.publish();
                    let _ = reply.send(Err(ConnectError::OpenFailed { source: err }));
                }
            }
        }
    }

    async fn flush(&mut self) {
        if self.queue.is_empty() {
            return;
        }

        let transport = match self.transport.as_mut() {
            Some(t) => t,
            None => return,
        };

        log::debug!("Flushing {} queued messages", self.queue.len());

        let flushed = self.queue.flush(transport.as_mut()).await;

        log::debug!("Flushed {} messages, {} left in queue", flushed.sent, self.queue.len());

        if let Some(err) = flushed.error {
            log::warn!("Flush queue failed, retry on next open: {}", err);
        }
    }

    async fn on_frame(&mut self, item: Option<Result<Frame, WebsocketError>>) {
        match dispatch(item) {
            Dispatch::Emit(event) => self.emit(event),
            Dispatch::Heartbeat(envelope) => {
                let answer = !envelope.is_heartbeat_ack();
                let task_id = if envelope.task_id.is_empty() {
                    self.task_id.clone().unwrap_or_default()
                } else {
                    envelope.task_id.clone()
                };

                self.emit(Event::Heartbeat(envelope));

                if answer {
                    log::trace!("Answer heartbeat of task {}", task_id);
                    self.deliver(Envelope::heartbeat_ack(&task_id)).await;
                }
            }
            Dispatch::Closed(info) => {
                log::info!("Transport closed, code {}: {}", info.code, info.reason);
                // completes the close handshake if the peer started it
                if let Some(transport) = self.transport.take() {
                    shutdown(transport, None).await;
                }
                self.handle_close(info);
            }
            Dispatch::Failed(err) => {
                log::warn!("Transport broken when receive message: {}", err);

                let reason = err.to_string();
                self.set_state(ConnectionState::Error);
                self.emit(Event::Error(ErrorEvent::Transport(Arc::new(err))));
                self.handle_close(CloseInfo::abnormal(reason));
            }
            Dispatch::Ignore => {}
        }
    }

    async fn on_heartbeat(&mut self) {
        match self.task_id.clone() {
            Some(task_id) => {
                log::trace!("Send heartbeat of task {}", task_id);
                self.deliver(Envelope::heartbeat(&task_id)).await;
            }
            None => log::trace!("No task, skip heartbeat"),
        }
    }

    fn on_reconnect_due(&mut self) {
        self.reconnect = None;

        log::info!("Reconnect attempt {}/{}", self.attempts, self.config.max_reconnect_attempts);

        self.start_open();
    }

    /// Write now if connected, else queue
    async fn deliver(&mut self, envelope: Envelope) {
        if self.state == ConnectionState::Connected {
            if let Some(transport) = self.transport.as_mut() {
                let message_type = envelope.r#type;

                let result = transport.send(Frame::Text(envelope.encode())).await;
                match result {
                    Ok(()) => log::trace!("Sent {} message", message_type),
                    Err(err) => {
                        log::warn!("Send {} message failed, dropped: {}", message_type, err);
                        self.emit(Event::Error(ErrorEvent::SendFailed {
                            message_type,
                            reason: err.to_string(),
                        }));
                    }
                }
                return;
            }
        }

        log::debug!(
            "Link is {}, queue {} message, {} queued before",
            self.state,
            envelope.r#type,
            self.queue.len()
        );
        self.queue.push(envelope);
    }

    fn handle_close(&mut self, info: CloseInfo) {
        let info = CloseInfo {
            intentional: self.intentional,
            ..info
        };

        self.heartbeat.stop();
        self.transport = None;
        self.set_state(ConnectionState::Disconnected);
        self.emit(Event::Disconnected(info));

        if self.intentional {
            return;
        }

        if self.attempts < self.config.max_reconnect_attempts {
            self.schedule_reconnect();
        } else {
            log::warn!(
                "Reconnect attempts exhausted after {} tries, stay disconnected",
                self.attempts
            );
        }
    }

    fn schedule_reconnect(&mut self) {
        self.cancel_reconnect();

        self.attempts += 1;
        let delay = backoff::reconnect_delay(&self.config, self.attempts);

        log::info!("Schedule reconnect attempt {} in {:?}", self.attempts, delay);

        self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
        self.set_state(ConnectionState::Reconnecting);
    }

    fn cancel_reconnect(&mut self) {
        if self.reconnect.take().is_some() {
            log::debug!("Pending reconnect cancelled");
        }
    }

    async fn disconnect(&mut self) {
        self.intentional = true;
        self.cancel_reconnect();
        self.heartbeat.stop();
        self.task_id = None;

        if self.opening.take().is_some() {
            log::debug!("Abandon transport opening");
            if let Some(reply) = self.connect_reply.take() {
                let _ = reply.send(Err(ConnectError::Aborted));
            }
        }

        match self.transport.take() {
            Some(transport) => {
                log::info!("Closing transport");

                let frame = Frame::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: DISCONNECT_REASON.into(),
                }));
                shutdown(transport, Some(frame)).await;

                self.handle_close(CloseInfo {
                    code: CLOSE_NORMAL,
                    reason: DISCONNECT_REASON.to_string(),
                    intentional: true,
                });
            }
            None => self.set_state(ConnectionState::Disconnected),
        }
    }

    async fn teardown(&mut self) {
        log::debug!("All manager handles dropped, tear down");

        self.disconnect().await;

        let discarded = self.queue.clear();
        if discarded > 0 {
            log::warn!("Discard {} undelivered queued messages", discarded);
        }
    }
}
