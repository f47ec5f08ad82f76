use tokio::sync::oneshot;

use super::ConnectError;
use crate::{
    event::{EventKind, Listener, ListenerId},
    message::Envelope,
};

/// Requests from [ConnectionManager](super::ConnectionManager) handles to the control task
#[derive(Debug)]
pub(crate) enum Command {
    Connect {
        task_id: Option<String>,
        reply: oneshot::Sender<Result<(), ConnectError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    // stamped on the caller side
    Send(Envelope),
    Subscribe(String),
    Unsubscribe(String),
    Listen {
        id: ListenerId,
        kind: Option<EventKind>,
        listener: Listener,
    },
    Unlisten(ListenerId),
}
