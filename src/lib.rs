//! Reconnecting client transport.
//!
//! This crate owns a single outbound TCP connection to a fixed endpoint and
//! drives it through connection establishment, a bounded connect timeout,
//! retries with a fixed sleep between attempts, and an active protocol
//! session. Transport errors are classified as ignorable or fatal; terminal
//! outcomes are reported exactly once as either an error or a graceful done.
//!
//! # Features
//!
//! - Non-blocking, sans-IO [`ConnectionManager`](connection::ConnectionManager)
//!   generic over [`Transport`](connection::Transport) and
//!   [`Timer`](connection::Timer) capabilities
//! - Configurable attempt counting and opt-in auto-reconnect
//! - Best-effort writer tolerant of partial writes
//! - `tokio` feature: a real TCP transport and an
//!   [`AsyncClient`](connection::AsyncClient) that runs the state machine on
//!   its own task
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "tokio")]
//! # async fn demo() -> reconnecting_client::Result<()> {
//! use reconnecting_client::connection::{AsyncClient, ClientConfig, ClientEvent};
//! use reconnecting_client::Endpoint;
//!
//! let endpoint: Endpoint = "127.0.0.1:8080".parse()?;
//! let mut client = AsyncClient::spawn(endpoint, ClientConfig::robust());
//! client.start()?;
//!
//! while let Some(event) = client.next_event().await {
//!     match event {
//!         ClientEvent::Readable => println!("received {:?}", client.read().await?),
//!         ClientEvent::WriteDrained => {}
//!         ClientEvent::Done => break,
//!         ClientEvent::Error(err) => return Err(err.into()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Lifecycle
//!
//! ```text
//!            start()                 Connected
//!   Idle ───────────────▶ Connecting ─────────▶ ProtocolActive
//!    ▲                     │   ▲   │                  │
//!    │ closed before       │   │   │ timeout / fatal  │ closed / stop()
//!    │ activation          │   │   ▼ error            ▼
//!    └─────────────────────┘   │  Failed            Stopped
//!                              │
//!               reconnect sleep (auto-reconnect)
//! ```

pub mod connection;
pub mod error;

// Async modules (require tokio feature)
#[cfg(feature = "tokio")]
pub mod transport_async;

// Re-export commonly used types at the crate root
pub use connection::{ClientConfig, ClientEvent, ConnectionManager, ConnectionState, Endpoint, RetryPolicy};
pub use error::{ClientError, ConnectionError, Result};
