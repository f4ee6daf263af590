//! Async transport implementations using tokio.
//!
//! This module is only available with the `tokio` feature enabled.
//! [`TcpTransport`] implements the [`Transport`](crate::connection::Transport)
//! capability on a real socket; it is normally driven by
//! [`AsyncClient`](crate::connection::AsyncClient).

pub mod tcp;

pub use tcp::{TcpTransport, TransportEvent};
