//! In-memory connector and transport for state machine tests.

use std::{
    collections::VecDeque,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    task::{Context, Poll},
};

use futures_util::{Sink, Stream};
use tokio::sync::mpsc;
use url::Url;

use super::{BoxTransport, Connector, Frame, WebsocketError};
use crate::message::Envelope;

#[derive(Debug, Default)]
struct Shared {
    live: AtomicUsize,
    max_live: AtomicUsize,
    opens: AtomicUsize,
    // scripted outcomes of next opens, true means fail
    script: Mutex<VecDeque<bool>>,
    // open never finishes while set
    hang: AtomicBool,
    peers: Mutex<Vec<MockPeer>>,
}

/// Connector handing out in-memory transports
#[derive(Debug, Clone, Default)]
pub(crate) struct MockConnector {
    shared: Arc<Shared>,
}

impl MockConnector {
    pub fn fail_next(&self, n: usize) {
        let mut script = self.shared.script.lock().unwrap();
        script.extend(std::iter::repeat(true).take(n));
    }

    pub fn hang(&self, hang: bool) {
        self.shared.hang.store(hang, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.shared.max_live.load(Ordering::SeqCst)
    }

    pub fn peer(&self, index: usize) -> MockPeer {
        self.shared.peers.lock().unwrap()[index].clone()
    }

    pub fn last_peer(&self) -> MockPeer {
        self.shared.peers.lock().unwrap().last().unwrap().clone()
    }

    pub fn peer_count(&self) -> usize {
        self.shared.peers.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    async fn open(&self, _url: &Url) -> Result<BoxTransport, WebsocketError> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);

        if self.shared.hang.load(Ordering::SeqCst) {
            futures_util::future::pending::<()>().await;
        }

        let fail = self.shared.script.lock().unwrap().pop_front().unwrap_or(false);
        if fail {
            return Err(WebsocketError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let peer = MockPeer {
            inbound: Arc::new(Mutex::new(Some(tx))),
            written: Arc::default(),
            fail_writes: Arc::default(),
            stall_writes: Arc::default(),
            closed: Arc::default(),
        };

        let live = self.shared.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_live.fetch_max(live, Ordering::SeqCst);

        let transport = MockTransport {
            inbound: rx,
            peer: peer.clone(),
            shared: Arc::clone(&self.shared),
        };
        self.shared.peers.lock().unwrap().push(peer);

        Ok(Box::new(transport))
    }
}

/// Remote side of a mock transport
#[derive(Debug, Clone)]
pub(crate) struct MockPeer {
    inbound: Arc<Mutex<Option<mpsc::UnboundedSender<Result<Frame, WebsocketError>>>>>,
    written: Arc<Mutex<Vec<Frame>>>,
    fail_writes: Arc<AtomicBool>,
    // writes and close never finish while set
    stall_writes: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MockPeer {
    pub fn push_text(&self, text: &str) {
        self.push(Ok(Frame::Text(text.to_string())));
    }

    pub fn push(&self, frame: Result<Frame, WebsocketError>) {
        if let Some(tx) = self.inbound.lock().unwrap().as_ref() {
            let _ = tx.send(frame);
        }
    }

    /// end the inbound stream without close frame
    pub fn drop_link(&self) {
        self.inbound.lock().unwrap().take();
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn stall_writes(&self, stall: bool) {
        self.stall_writes.store(stall, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<Frame> {
        self.written.lock().unwrap().clone()
    }

    /// written text frames decoded as envelopes, close frames skipped
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.written()
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Text(text) => Some(serde_json::from_str(&text).unwrap()),
                _ => None,
            })
            .collect()
    }
}

struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Result<Frame, WebsocketError>>,
    peer: MockPeer,
    shared: Arc<Shared>,
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Stream for MockTransport {
    type Item = Result<Frame, WebsocketError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inbound.poll_recv(cx)
    }
}

impl Sink<Frame> for MockTransport {
    type Error = WebsocketError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.peer.stall_writes.load(Ordering::SeqCst) {
            return Poll::Pending;
        }
        if self.peer.closed.load(Ordering::SeqCst) {
            return Poll::Ready(Err(WebsocketError::AlreadyClosed));
        }
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        if self.peer.fail_writes.load(Ordering::SeqCst) {
            return Err(WebsocketError::AlreadyClosed);
        }
        self.peer.written.lock().unwrap().push(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.peer.stall_writes.load(Ordering::SeqCst) {
            return Poll::Pending;
        }
        self.peer.closed.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}
