//! Error types for the reconnecting client.

use std::io;
use thiserror::Error;

use crate::connection::{Endpoint, TransportErrorKind, WriteError};

/// Terminal failure of a connection lifecycle.
///
/// Carried by [`ClientEvent::Error`](crate::connection::ClientEvent::Error);
/// at most one is emitted per lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connect timer fired before the transport connected.
    #[error("Connect timeout")]
    ConnectTimeout,

    /// The attempt counter reached the configured bound.
    #[error("Maximum protocol retries reached (max {max})")]
    MaxRetriesExceeded { max: u32 },

    /// Name or address resolution failed.
    #[error("Host not found: {endpoint}")]
    HostNotFound { endpoint: Endpoint },

    /// A known-bad socket condition.
    #[error("Bad socket error: {0}")]
    FatalTransport(TransportErrorKind),

    /// A socket condition outside the enumerated set.
    #[error("Unknown socket error: {0}")]
    UnknownTransport(TransportErrorKind),
}

/// Errors returned by client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// I/O error outside the connection state machine.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The connection failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The operation needs an active protocol session.
    #[error("Not connected")]
    NotConnected,

    /// The transport rejected part of a write.
    #[error(transparent)]
    Write(#[from] WriteError),

    /// The endpoint string could not be parsed.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The task driving the connection has exited.
    #[error("Client task has shut down")]
    Closed,
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Create a new invalid endpoint error.
    pub fn invalid_endpoint(msg: impl Into<String>) -> Self {
        Self::InvalidEndpoint(msg.into())
    }

    /// Check if retrying the same operation later can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io(e) if e.kind() == io::ErrorKind::WouldBlock
                || e.kind() == io::ErrorKind::TimedOut
                || e.kind() == io::ErrorKind::Interrupted
        ) || matches!(self, Self::NotConnected)
    }
}
