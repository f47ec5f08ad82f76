use crate::{
    event::{CloseInfo, ErrorEvent, Event},
    message::{Envelope, Inbound, MessageType, ParseMessageError},
    transport::{Frame, WebsocketError},
};

/// Close code when a close frame carries no status
pub(crate) const CLOSE_NO_STATUS: u16 = 1005;

/// What the state machine should do with an inbound frame
#[derive(Debug)]
pub(crate) enum Dispatch {
    /// emit to listeners
    Emit(Event),
    /// emit to listeners and answer unless it is an acknowledgement
    Heartbeat(Envelope),
    /// transport closed
    Closed(CloseInfo),
    /// transport read failed, the link is gone
    Failed(WebsocketError),
    /// nothing to do
    Ignore,
}

/// Classify one item read from the transport
pub(crate) fn dispatch(item: Option<Result<Frame, WebsocketError>>) -> Dispatch {
    let frame = match item {
        None => {
            log::debug!("Transport stream ended");
            return Dispatch::Closed(CloseInfo::abnormal("transport stream ended"));
        }
        Some(Err(WebsocketError::ConnectionClosed)) | Some(Err(WebsocketError::AlreadyClosed)) => {
            log::debug!("Transport reports connection closed");
            return Dispatch::Closed(CloseInfo::abnormal("connection closed"));
        }
        Some(Err(err)) => return Dispatch::Failed(err),
        Some(Ok(frame)) => frame,
    };

    match frame {
        Frame::Text(text) => {
            let result = Envelope::decode(&text);
            decoded(result, text)
        }
        Frame::Binary(data) => {
            let raw = String::from_utf8_lossy(&data).into_owned();
            decoded(Envelope::decode_binary(data), raw)
        }
        Frame::Close(frame) => {
            let info = match frame {
                Some(frame) => CloseInfo {
                    code: frame.code.into(),
                    reason: frame.reason.into_owned(),
                    intentional: false,
                },
                None => CloseInfo {
                    code: CLOSE_NO_STATUS,
                    reason: String::new(),
                    intentional: false,
                },
            };
            log::debug!("Received close frame, code {}", info.code);
            Dispatch::Closed(info)
        }
        other => {
            log::trace!("Ignore control frame {:?}", other);
            Dispatch::Ignore
        }
    }
}

fn decoded(result: Result<Inbound, ParseMessageError>, raw: String) -> Dispatch {
    match result {
        Ok(Inbound::Known(envelope)) => {
            log::trace!(
                "Received {} message for task {}",
                envelope.r#type,
                envelope.task_id
            );
            if envelope.r#type == MessageType::Heartbeat {
                Dispatch::Heartbeat(envelope)
            } else {
                Dispatch::Emit(Event::from_envelope(envelope))
            }
        }
        Ok(Inbound::Unknown { type_name }) => {
            log::warn!("Drop message with unknown type {}", type_name);
            Dispatch::Ignore
        }
        Err(err) => {
            log::warn!("Parse inbound message failed: {}", err);
            log::trace!("Parse failed message data: {}", raw);
            Dispatch::Emit(Event::Error(ErrorEvent::Malformed {
                raw,
                reason: err.to_string(),
            }))
        }
    }
}

#[cfg(test)]
impl Dispatch {
    fn is_abnormal_close(&self) -> bool {
        matches!(self, Self::Closed(info) if info.code == crate::event::CLOSE_ABNORMAL)
    }
}
