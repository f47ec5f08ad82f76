//! Typed events emitted by the connection manager.

mod listener;

pub use listener::{EventStream, ListenerId};
pub(crate) use listener::{Listener, Listeners};

use std::{error::Error as StdError, fmt::Display, sync::Arc};

use enum_as_inner::EnumAsInner;

use crate::{
    manager::ConnectionState,
    message::{Envelope, MessageType},
};

/// Close code of a normal closure
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code used when the link went away without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Metadata of a closed connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// websocket close code
    pub code: u16,
    /// close reason
    pub reason: String,
    /// closed by [disconnect](crate::ConnectionManager::disconnect)
    pub intentional: bool,
}

impl CloseInfo {
    pub(crate) fn abnormal<S: Into<String>>(reason: S) -> Self {
        Self {
            code: CLOSE_ABNORMAL,
            reason: reason.into(),
            intentional: false,
        }
    }
}

/// Payload of an [Event::Error]
#[derive(Debug, Clone)]
pub enum ErrorEvent {
    /// transport open/read failure
    Transport(Arc<dyn StdError + Send + Sync>),
    /// inbound frame could not be decoded
    Malformed {
        /// offending frame payload
        raw: String,
        /// decode failure description
        reason: String,
    },
    /// backend sent an error message
    Remote(Envelope),
    /// transport rejected a direct write
    SendFailed {
        /// type of the dropped message
        message_type: MessageType,
        /// write failure description
        reason: String,
    },
}

impl Display for ErrorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport failed: {}", err),
            Self::Malformed { reason, .. } => write!(f, "malformed inbound message: {}", reason),
            Self::Remote(envelope) => write!(f, "backend error for task {}", envelope.task_id),
            Self::SendFailed {
                message_type,
                reason,
            } => write!(f, "send {} message failed: {}", message_type, reason),
        }
    }
}

/// Event emitted to listeners
#[derive(Debug, Clone, EnumAsInner)]
pub enum Event {
    /// transport opened
    Connected,
    /// transport closed
    Disconnected(CloseInfo),
    /// something failed, never fatal for the manager
    Error(ErrorEvent),
    /// connection state changed to the carried value
    StateChange(ConnectionState),
    /// inbound progress message
    Progress(Envelope),
    /// inbound log message
    Log(Envelope),
    /// inbound status message
    Status(Envelope),
    /// inbound complete message
    Complete(Envelope),
    /// inbound heartbeat message
    Heartbeat(Envelope),
}

/// Event name used for listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [Event::Connected]
    Connected,
    /// [Event::Disconnected]
    Disconnected,
    /// [Event::Error]
    Error,
    /// [Event::StateChange]
    StateChange,
    /// [Event::Progress]
    Progress,
    /// [Event::Log]
    Log,
    /// [Event::Status]
    Status,
    /// [Event::Complete]
    Complete,
    /// [Event::Heartbeat]
    Heartbeat,
}

impl Event {
    /// get the kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected(_) => EventKind::Disconnected,
            Self::Error(_) => EventKind::Error,
            Self::StateChange(_) => EventKind::StateChange,
            Self::Progress(_) => EventKind::Progress,
            Self::Log(_) => EventKind::Log,
            Self::Status(_) => EventKind::Status,
            Self::Complete(_) => EventKind::Complete,
            Self::Heartbeat(_) => EventKind::Heartbeat,
        }
    }

    /// Turn an inbound envelope into the event of the same name
    pub fn from_envelope(envelope: Envelope) -> Self {
        match envelope.r#type {
            MessageType::Progress => Self::Progress(envelope),
            MessageType::Log => Self::Log(envelope),
            MessageType::Status => Self::Status(envelope),
            MessageType::Error => Self::Error(ErrorEvent::Remote(envelope)),
            MessageType::Complete => Self::Complete(envelope),
            MessageType::Heartbeat => Self::Heartbeat(envelope),
        }
    }
}
