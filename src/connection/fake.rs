//! Scriptable in-memory transport for tests.

use bytes::{Bytes, BytesMut};

use super::classify::TransportErrorKind;
use super::config::Endpoint;
use super::transport::{Transport, TransportState};

#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    pub state: TransportState,
    pub connects: Vec<Endpoint>,
    pub aborts: u32,
    pub written: Vec<u8>,
    /// Most bytes accepted by a single `write` call.
    pub chunk_limit: Option<usize>,
    /// Total bytes accepted before every further write fails.
    pub fail_after: Option<usize>,
    /// Bytes held back as not yet flushed.
    pub unflushed: usize,
    pub inbound: BytesMut,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for FakeTransport {
    fn connect(&mut self, endpoint: &Endpoint) {
        self.connects.push(endpoint.clone());
        self.state = TransportState::Connecting;
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn abort(&mut self) {
        self.aborts += 1;
        self.state = TransportState::Unconnected;
        self.inbound.clear();
        self.unflushed = 0;
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportErrorKind> {
        let mut n = buf.len();
        if let Some(limit) = self.fail_after {
            let room = limit.saturating_sub(self.written.len());
            if room == 0 {
                return Err(TransportErrorKind::Network);
            }
            n = n.min(room);
        }
        if let Some(chunk) = self.chunk_limit {
            n = n.min(chunk);
        }
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn read_available(&mut self) -> Bytes {
        self.inbound.split().freeze()
    }

    fn bytes_to_write(&self) -> usize {
        self.unflushed
    }
}
