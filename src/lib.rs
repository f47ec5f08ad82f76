//! # Tasklink
//!
//! Persistent real-time connection to a task event backend.
//!
//! A [ConnectionManager] keeps one websocket open, turns inbound frames into typed
//! [Event]s, reconnects with exponential backoff after the link drops and queues outbound
//! messages until they can be written.
//!
//! ```no_run
//! use tasklink::{Config, ConnectionManager, EventKind};
//!
//! # async fn run() -> tasklink::Result<()> {
//! let config = Config::builder("wss://backend.example/ws").build().unwrap();
//! let manager = ConnectionManager::new(config);
//!
//! manager.on(EventKind::Progress, |event| println!("{:?}", event));
//! manager.connect(Some("task-1")).await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_debug_implementations, missing_docs)]
#![forbid(unsafe_code)]

pub mod backoff;
pub mod event;
pub mod message;
pub mod transport;

mod config;
mod error;
mod manager;

pub use config::{Config, ConfigBuilder, ConfigError};
pub use error::{Error, Result};
pub use event::{CloseInfo, ErrorEvent, Event, EventKind, EventStream, ListenerId};
pub use manager::{ConnectError, ConnectionManager, ConnectionState};
pub use message::{Envelope, MessageType, OutboundMessage};
