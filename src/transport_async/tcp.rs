//! Non-blocking TCP transport on tokio.

use std::future::Future;
use std::pin::Pin;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::Interest;
use tokio::net::{TcpStream, lookup_host};
use tracing::debug;

use crate::connection::{Endpoint, Transport, TransportErrorKind, TransportState};

/// Initial capacity reserved for each inbound read.
const READ_CHUNK: usize = 4096;

type ConnectFuture = Pin<Box<dyn Future<Output = Result<TcpStream, TransportErrorKind>> + Send>>;

/// Something the socket produced that the manager must hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket changed state.
    StateChanged(TransportState),
    /// The socket failed; it is now [`TransportState::Unconnected`].
    Error(TransportErrorKind),
    /// Bytes were received.
    Readable,
    /// The outbound queue was flushed to the kernel.
    Drained,
}

/// A TCP socket that connects in the background and queues writes.
///
/// The transport only makes progress while [`next_event`](Self::next_event)
/// is being polled.
pub struct TcpTransport {
    state: TransportState,
    connecting: Option<ConnectFuture>,
    stream: Option<TcpStream>,
    inbound: BytesMut,
    outbound: BytesMut,
}

impl TcpTransport {
    /// Create an unconnected transport.
    pub fn new() -> Self {
        Self {
            state: TransportState::Unconnected,
            connecting: None,
            stream: None,
            inbound: BytesMut::new(),
            outbound: BytesMut::new(),
        }
    }

    /// Wait for the next socket event.
    ///
    /// Cancel safe: dropping the returned future loses no data and leaves a
    /// pending connect in place.
    pub async fn next_event(&mut self) -> TransportEvent {
        if let Some(connecting) = self.connecting.as_mut() {
            let result = connecting.await;
            self.connecting = None;
            return match result {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(error = %e, "set_nodelay failed");
                    }
                    self.stream = Some(stream);
                    self.state = TransportState::Connected;
                    TransportEvent::StateChanged(TransportState::Connected)
                }
                Err(kind) => self.fail(kind),
            };
        }

        let Some(stream) = self.stream.as_ref() else {
            return std::future::pending().await;
        };

        loop {
            let interest = if self.outbound.is_empty() {
                Interest::READABLE
            } else {
                Interest::READABLE | Interest::WRITABLE
            };

            let ready = match stream.ready(interest).await {
                Ok(ready) => ready,
                Err(e) => return self.fail(TransportErrorKind::from(&e)),
            };

            if ready.is_readable() {
                self.inbound.reserve(READ_CHUNK);
                match stream.try_read_buf(&mut self.inbound) {
                    Ok(0) => return self.fail(TransportErrorKind::RemoteHostClosed),
                    Ok(_) => return TransportEvent::Readable,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => return self.fail(TransportErrorKind::from(&e)),
                }
            }

            if ready.is_writable() && !self.outbound.is_empty() {
                match stream.try_write(&self.outbound) {
                    Ok(n) => {
                        self.outbound.advance(n);
                        if self.outbound.is_empty() {
                            return TransportEvent::Drained;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => return self.fail(TransportErrorKind::from(&e)),
                }
            }
        }
    }

    fn fail(&mut self, kind: TransportErrorKind) -> TransportEvent {
        debug!(%kind, "socket error");
        self.connecting = None;
        self.stream = None;
        self.outbound.clear();
        self.state = TransportState::Unconnected;
        TransportEvent::Error(kind)
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, endpoint: &Endpoint) {
        let host = endpoint.host().to_owned();
        let port = endpoint.port();

        self.state = TransportState::HostLookup;
        self.connecting = Some(Box::pin(async move {
            let addrs = lookup_host((host.as_str(), port))
                .await
                .map_err(|_| TransportErrorKind::HostNotFound)?;

            let mut last = TransportErrorKind::HostNotFound;
            for addr in addrs {
                match TcpStream::connect(addr).await {
                    Ok(stream) => return Ok(stream),
                    Err(e) => last = TransportErrorKind::from(&e),
                }
            }
            Err(last)
        }));
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn abort(&mut self) {
        self.connecting = None;
        self.stream = None;
        self.inbound.clear();
        self.outbound.clear();
        self.state = TransportState::Unconnected;
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportErrorKind> {
        let Some(stream) = self.stream.as_ref() else {
            return Err(TransportErrorKind::Operation);
        };

        let mut sent = 0;
        if self.outbound.is_empty() {
            match stream.try_write(buf) {
                Ok(n) => sent = n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(TransportErrorKind::from(&e)),
            }
        }
        self.outbound.extend_from_slice(&buf[sent..]);
        Ok(buf.len())
    }

    fn read_available(&mut self) -> Bytes {
        self.inbound.split().freeze()
    }

    fn bytes_to_write(&self) -> usize {
        self.outbound.len()
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("state", &self.state)
            .field("peer_addr", &self.stream.as_ref().and_then(|s| s.peer_addr().ok()))
            .field("inbound", &self.inbound.len())
            .field("outbound", &self.outbound.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn connected_pair() -> (TcpTransport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut transport = TcpTransport::new();
        transport.connect(&Endpoint::new("127.0.0.1", addr.port()));
        assert_eq!(transport.state(), TransportState::HostLookup);

        let (event, accepted) = tokio::join!(transport.next_event(), listener.accept());
        assert_eq!(event, TransportEvent::StateChanged(TransportState::Connected));
        (transport, accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_connect_write_read() {
        let (mut transport, mut peer) = connected_pair().await;
        assert_eq!(transport.state(), TransportState::Connected);

        assert_eq!(transport.write(b"PING"), Ok(4));
        let mut buf = [0u8; 4];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PING");

        peer.write_all(b"PONG").await.unwrap();
        assert_eq!(transport.next_event().await, TransportEvent::Readable);
        assert_eq!(transport.read_available().as_ref(), b"PONG");
    }

    #[tokio::test]
    async fn test_peer_close() {
        let (mut transport, peer) = connected_pair().await;
        drop(peer);

        assert_eq!(
            transport.next_event().await,
            TransportEvent::Error(TransportErrorKind::RemoteHostClosed)
        );
        assert_eq!(transport.state(), TransportState::Unconnected);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut transport = TcpTransport::new();
        transport.connect(&Endpoint::new("127.0.0.1", port));

        assert_eq!(
            transport.next_event().await,
            TransportEvent::Error(TransportErrorKind::ConnectionRefused)
        );
        assert_eq!(transport.state(), TransportState::Unconnected);
    }

    #[tokio::test]
    async fn test_write_without_connection() {
        let mut transport = TcpTransport::new();
        assert_eq!(transport.write(b"x"), Err(TransportErrorKind::Operation));
    }
}
