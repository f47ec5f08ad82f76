use std::collections::VecDeque;

use futures_util::{Sink, SinkExt};

use crate::{
    message::Envelope,
    transport::{Frame, WebsocketError},
};

/// Envelopes waiting for an open transport, FIFO
#[derive(Debug, Default)]
pub(crate) struct OutboundQueue {
    buffer: VecDeque<Envelope>,
}

/// Result of a flush cycle
#[derive(Debug)]
pub(crate) struct Flushed {
    pub sent: usize,
    pub error: Option<WebsocketError>,
}

impl OutboundQueue {
    pub fn push(&mut self, envelope: Envelope) {
        self.buffer.push_back(envelope);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Write queued envelopes in order until empty or the sink fails.
    ///
    /// The envelope whose write failed goes back to the head.
    pub async fn flush<S>(&mut self, sink: &mut S) -> Flushed
    where
        S: Sink<Frame, Error = WebsocketError> + Unpin + ?Sized,
    {
        let mut sent = 0;

        while let Some(envelope) = self.buffer.pop_front() {
            match sink.send(Frame::Text(envelope.encode())).await {
                Ok(()) => {
                    log::trace!("Flushed queued {} message", envelope.r#type);
                    sent += 1;
                }
                Err(err) => {
                    log::debug!("Flush stopped by write failure: {}", err);
                    self.buffer.push_front(envelope);
                    return Flushed {
                        sent,
                        error: Some(err),
                    };
                }
            }
        }

        Flushed { sent, error: None }
    }

    pub fn clear(&mut self) -> usize {
        let n = self.buffer.len();
        self.buffer.clear();
        n
    }
}
