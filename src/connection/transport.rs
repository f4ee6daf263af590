//! Byte-stream transport abstraction.

use bytes::Bytes;

use super::classify::TransportErrorKind;
use super::config::Endpoint;

/// Socket-level state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// No connection and no attempt in flight.
    #[default]
    Unconnected,
    /// Resolving the endpoint's host name.
    HostLookup,
    /// TCP handshake in progress.
    Connecting,
    /// Connected and usable.
    Connected,
    /// Shutting down.
    Closing,
}

/// A non-blocking byte-stream socket.
///
/// Implementations never call back into the manager. State changes, errors
/// and readiness are reported by the driver through the manager's `handle_*`
/// methods, in the order the underlying stream produced them.
pub trait Transport {
    /// Begin an asynchronous connect. Completion is reported later as a
    /// state change to [`TransportState::Connected`] or as an error.
    fn connect(&mut self, endpoint: &Endpoint);

    /// Current socket state.
    fn state(&self) -> TransportState;

    /// Drop the connection immediately, discarding buffered data. Must not
    /// produce any notification.
    fn abort(&mut self);

    /// Queue bytes for sending, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportErrorKind>;

    /// Take all bytes received so far.
    fn read_available(&mut self) -> Bytes;

    /// Bytes accepted by `write` but not yet handed to the network.
    fn bytes_to_write(&self) -> usize {
        0
    }
}

/// Builds a fresh transport when the manager has none.
pub trait TransportFactory {
    /// Transport produced by this factory.
    type Transport: Transport;

    /// Construct a new, unconnected transport.
    fn build(&mut self) -> Self::Transport;
}

impl<T, F> TransportFactory for F
where
    T: Transport,
    F: FnMut() -> T,
{
    type Transport = T;

    fn build(&mut self) -> T {
        self()
    }
}
