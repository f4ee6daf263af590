//! Connection management for a single reconnecting client.
//!
//! This module provides:
//! - [`ConnectionManager`], a non-blocking state machine that drives one
//!   outbound connection through connect, protocol-active and stop/retry
//! - The [`Transport`] and [`Timer`] capabilities it is generic over
//! - Error classification and a partial-write tolerant writer
//! - Configuration for retries, timeouts and auto-reconnect
//!
//! # Example
//!
//! Driving the manager by hand, as a custom reactor (or a test) would:
//!
//! ```
//! use bytes::Bytes;
//! use reconnecting_client::connection::{
//!     ClientConfig, ClientEvent, ConnectionManager, ConnectionState, Endpoint, ManualTimer,
//!     TimerKind, Transport, TransportErrorKind, TransportState,
//! };
//! use std::time::Duration;
//!
//! #[derive(Default)]
//! struct NeverConnects(TransportState);
//!
//! impl Transport for NeverConnects {
//!     fn connect(&mut self, _: &Endpoint) { self.0 = TransportState::Connecting; }
//!     fn state(&self) -> TransportState { self.0 }
//!     fn abort(&mut self) { self.0 = TransportState::Unconnected; }
//!     fn write(&mut self, buf: &[u8]) -> Result<usize, TransportErrorKind> { Ok(buf.len()) }
//!     fn read_available(&mut self) -> Bytes { Bytes::new() }
//! }
//!
//! let config = ClientConfig::simple().with_connect_timeout(Duration::from_millis(100));
//! let mut manager = ConnectionManager::new(
//!     Endpoint::new("example.test", 9999),
//!     config,
//!     NeverConnects::default,
//!     ManualTimer::new(),
//!     ManualTimer::new(),
//! );
//!
//! manager.start();
//! assert_eq!(manager.connect_timer().interval(), Some(Duration::from_millis(100)));
//!
//! // The reactor observed the 100ms deadline passing.
//! manager.handle_timeout(TimerKind::ConnectTimeout);
//!
//! let event = manager.poll_event().unwrap();
//! assert!(matches!(event, ClientEvent::Error(ref e) if e.to_string() == "Connect timeout"));
//! assert_eq!(manager.state(), ConnectionState::Failed);
//! ```

mod classify;
mod config;
mod manager;
mod state;
mod timer;
mod transport;
mod writer;

#[cfg(test)]
mod fake;

pub use classify::{ErrorClass, TransportErrorKind, classify};
pub use config::{ClientConfig, DEFAULT_MAX_RETRIES, Endpoint, RetryCounting, RetryPolicy};
pub use manager::{ClientEvent, ConnectionManager};
pub use state::{ConnectionState, ConnectionStats};
pub use timer::{ManualTimer, Timer, TimerKind};
pub use transport::{Transport, TransportFactory, TransportState};
pub use writer::{WriteError, write_all};

// Async variants (require tokio feature)
#[cfg(feature = "tokio")]
mod client_async;

#[cfg(feature = "tokio")]
pub use client_async::AsyncClient;
#[cfg(feature = "tokio")]
pub use timer::DeadlineTimer;
