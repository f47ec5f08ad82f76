use std::{
    fmt::Debug,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    task::Poll,
};

use futures_util::Stream;
use tokio::sync::mpsc;

use super::{Event, EventKind};

/// Handle to remove a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

pub(crate) type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

pub(crate) enum Listener {
    Callback(Callback),
    Channel(mpsc::UnboundedSender<Event>),
}

impl Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("Listener::Callback"),
            Self::Channel(_) => f.write_str("Listener::Channel"),
        }
    }
}

#[derive(Debug)]
struct Entry {
    id: ListenerId,
    // None for every kind
    kind: Option<EventKind>,
    listener: Listener,
}

/// Registered listeners, in registration order
#[derive(Debug, Default)]
pub(crate) struct Listeners {
    entries: Vec<Entry>,
}

impl Listeners {
    pub fn add(&mut self, id: ListenerId, kind: Option<EventKind>, listener: Listener) {
        log::trace!("Add listener {:?} for {:?}", id, kind);
        self.entries.push(Entry { id, kind, listener });
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn emit(&mut self, event: &Event) {
        let kind = event.kind();
        log::trace!("Emit {:?} event", kind);

        self.entries.retain(|entry| {
            if entry.kind.map_or(false, |k| k != kind) {
                return true;
            }
            match &entry.listener {
                Listener::Callback(f) => {
                    if catch_unwind(AssertUnwindSafe(|| f(event))).is_err() {
                        log::warn!("Listener {:?} panicked on {:?} event", entry.id, kind);
                    }
                    true
                }
                Listener::Channel(tx) => {
                    let alive = tx.send(event.clone()).is_ok();
                    if !alive {
                        log::debug!("Event stream {:?} dropped, remove it", entry.id);
                    }
                    alive
                }
            }
        });
    }
}

/// Stream of every event emitted by a connection manager
#[derive(Debug)]
pub struct EventStream {
    pub(crate) rx: mpsc::UnboundedReceiver<Event>,
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;
    use crate::manager::ConnectionState;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Listener {
        let log = Arc::clone(log);
        Listener::Callback(Arc::new(move |event: &Event| {
            log.lock().unwrap().push(format!("{}:{:?}", name, event.kind()));
        }))
    }

    #[test]
    fn test_emit_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::default();

        listeners.add(ListenerId(1), Some(EventKind::Connected), recorder(&log, "a"));
        listeners.add(ListenerId(2), None, recorder(&log, "b"));
        listeners.add(ListenerId(3), Some(EventKind::Connected), recorder(&log, "c"));
        listeners.add(ListenerId(4), Some(EventKind::Log), recorder(&log, "d"));

        listeners.emit(&Event::Connected);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:Connected", "b:Connected", "c:Connected"]
        );
    }

    #[test]
    fn test_remove_listener() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::default();

        listeners.add(ListenerId(1), None, recorder(&log, "a"));
        assert!(listeners.remove(ListenerId(1)));
        assert!(!listeners.remove(ListenerId(1)));

        listeners.emit(&Event::StateChange(ConnectionState::Connecting));

        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_panicking_handler_does_not_stop_emit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::default();

        let boom: Listener = Listener::Callback(Arc::new(|_: &Event| panic!("handler bug")));
        listeners.add(ListenerId(1), None, boom);
        listeners.add(ListenerId(2), None, recorder(&log, "b"));

        listeners.emit(&Event::Connected);
        listeners.emit(&Event::Connected);

        assert_eq!(*log.lock().unwrap(), vec!["b:Connected", "b:Connected"]);
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn test_dropped_stream_removed() {
        let mut listeners = Listeners::default();
        let (tx, rx) = mpsc::unbounded_channel();

        listeners.add(ListenerId(1), None, Listener::Channel(tx));
        drop(EventStream { rx });

        listeners.emit(&Event::Connected);

        assert_eq!(listeners.len(), 0);
    }
}
