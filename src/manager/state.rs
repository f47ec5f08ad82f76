use std::fmt::Display;

/// Connection state of a [ConnectionManager](super::ConnectionManager)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// no transport, initial state and the state after reconnect attempts are exhausted
    #[default]
    Disconnected,
    /// transport opening
    Connecting,
    /// transport open
    Connected,
    /// waiting for the next reconnect attempt
    Reconnecting,
    /// transport failed, the close handling follows
    Error,
}

impl ConnectionState {
    /// get state name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values published by the control task for synchronous getters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Snapshot {
    pub state: ConnectionState,
    pub task_id: Option<String>,
    pub reconnect_attempts: u32,
    pub reconnect_pending: bool,
    pub heartbeat_active: bool,
    pub queued: usize,
}
