//! Classification of transport errors.

use std::io;
use thiserror::Error;

/// Low-level transport error kinds reported by a [`Transport`](super::Transport).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    #[error("connection refused")]
    ConnectionRefused,
    #[error("remote host closed the connection")]
    RemoteHostClosed,
    #[error("host not found")]
    HostNotFound,
    #[error("socket access denied")]
    SocketAccess,
    #[error("out of socket resources")]
    SocketResource,
    #[error("socket operation timed out")]
    SocketTimeout,
    #[error("datagram too large")]
    DatagramTooLarge,
    #[error("network error")]
    Network,
    #[error("address in use")]
    AddressInUse,
    #[error("address not available")]
    SocketAddressNotAvailable,
    #[error("unsupported socket operation")]
    UnsupportedSocketOperation,
    #[error("proxy authentication required")]
    ProxyAuthenticationRequired,
    #[error("proxy protocol error")]
    ProxyProtocol,
    /// An operation was attempted in a state that does not permit it.
    #[error("operation not permitted in current socket state")]
    Operation,
    /// The socket layer itself could not name the error.
    #[error("unknown socket error")]
    Unknown,
    /// Anything the socket layer reported that this set does not name.
    #[error("unenumerated socket error")]
    Unenumerated,
}

/// How the connection manager reacts to a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Expected mid-flight condition; no state transition.
    Ignorable,
    /// Resolution failure; fatal, reported with the endpoint.
    HostUnreachable,
    /// Known-bad condition; fatal.
    Fatal,
    /// Unexpected condition; fatal with a distinct message.
    Unknown,
}

/// Map a transport error kind to its class.
pub fn classify(kind: TransportErrorKind) -> ErrorClass {
    use TransportErrorKind::*;

    match kind {
        ConnectionRefused | SocketTimeout | RemoteHostClosed => ErrorClass::Ignorable,
        HostNotFound => ErrorClass::HostUnreachable,
        SocketAccess
        | SocketResource
        | DatagramTooLarge
        | AddressInUse
        | Network
        | SocketAddressNotAvailable
        | UnsupportedSocketOperation
        | ProxyAuthenticationRequired
        | ProxyProtocol
        | Unknown => ErrorClass::Fatal,
        Operation | Unenumerated => ErrorClass::Unknown,
    }
}

impl TransportErrorKind {
    /// Class of this error kind.
    pub fn class(self) -> ErrorClass {
        classify(self)
    }
}

impl From<&io::Error> for TransportErrorKind {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Self::RemoteHostClosed,
            io::ErrorKind::TimedOut => Self::SocketTimeout,
            io::ErrorKind::PermissionDenied => Self::SocketAccess,
            io::ErrorKind::OutOfMemory => Self::SocketResource,
            io::ErrorKind::AddrInUse => Self::AddressInUse,
            io::ErrorKind::AddrNotAvailable => Self::SocketAddressNotAvailable,
            io::ErrorKind::Unsupported => Self::UnsupportedSocketOperation,
            io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::NetworkDown
            | io::ErrorKind::HostUnreachable => Self::Network,
            io::ErrorKind::NotConnected => Self::Operation,
            _ => Self::Unenumerated,
        }
    }
}
