//! Driving a buffer to completion over a non-blocking transport.

use thiserror::Error;

use super::classify::TransportErrorKind;
use super::transport::Transport;

/// A write that the transport stopped accepting part-way.
///
/// Delivery is best-effort: the first `written` bytes were accepted by the
/// transport, the rest of the buffer was dropped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Write failed after {written} bytes: {kind}")]
pub struct WriteError {
    /// Bytes accepted before the failure.
    pub written: usize,
    /// Reason reported by the transport.
    pub kind: TransportErrorKind,
}

/// Write the whole of `buf`, retrying immediately on short writes.
///
/// Returns the number of bytes written, which equals `buf.len()` on success.
/// A transport that accepts nothing for a non-empty remainder is treated as
/// failed rather than retried.
pub fn write_all<T: Transport + ?Sized>(transport: &mut T, buf: &[u8]) -> Result<usize, WriteError> {
    let mut written = 0;

    while written < buf.len() {
        match transport.write(&buf[written..]) {
            Ok(0) => {
                return Err(WriteError {
                    written,
                    kind: TransportErrorKind::Operation,
                });
            }
            Ok(n) => written += n,
            Err(kind) => {
                tracing::debug!(written, %kind, "write abandoned");
                return Err(WriteError { written, kind });
            }
        }
    }

    Ok(written)
}
