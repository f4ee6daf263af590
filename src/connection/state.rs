//! Connection state management.

use std::time::Instant;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No attempt in progress.
    #[default]
    Idle,
    /// Connecting, or sleeping before the next attempt.
    Connecting,
    /// Connected; the protocol layer may read and write.
    ProtocolActive,
    /// Stopped gracefully.
    Stopped,
    /// Failed with an error.
    Failed,
}

impl ConnectionState {
    /// Check if the protocol session is live.
    pub fn is_active(&self) -> bool {
        *self == ConnectionState::ProtocolActive
    }

    /// Check if a connection attempt is in progress.
    pub fn is_connecting(&self) -> bool {
        *self == ConnectionState::Connecting
    }

    /// Check if the lifecycle has ended, gracefully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Stopped | ConnectionState::Failed)
    }
}

/// Connection statistics.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    /// Number of connect calls issued to the transport.
    pub connect_attempts: u64,
    /// Number of protocol activations.
    pub connect_count: u64,
    /// Number of connection failures.
    pub failure_count: u64,
    /// Number of reconnect sleeps scheduled.
    pub reconnect_count: u64,
    /// Number of completed writes.
    pub writes: u64,
    /// Total bytes accepted by the transport.
    pub bytes_sent: u64,
    /// Total bytes handed to the protocol layer.
    pub bytes_received: u64,
    /// Time of last protocol activation.
    pub last_connected: Option<Instant>,
    /// Time of last protocol stop.
    pub last_disconnected: Option<Instant>,
    /// Time of last failure.
    pub last_error: Option<Instant>,
}

impl ConnectionStats {
    /// Record a connect call.
    pub fn record_attempt(&mut self) {
        self.connect_attempts += 1;
    }

    /// Record a protocol activation.
    pub fn record_connect(&mut self) {
        self.connect_count += 1;
        self.last_connected = Some(Instant::now());
    }

    /// Record a protocol stop.
    pub fn record_disconnect(&mut self) {
        self.last_disconnected = Some(Instant::now());
    }

    /// Record a failure.
    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_error = Some(Instant::now());
    }

    /// Record a scheduled reconnect.
    pub fn record_reconnect(&mut self) {
        self.reconnect_count += 1;
    }

    /// Record a completed write.
    pub fn record_send(&mut self, bytes: usize) {
        self.writes += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Record bytes drained by the protocol layer.
    pub fn record_receive(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
    }

    /// Time since the last activation.
    pub fn uptime(&self) -> Option<std::time::Duration> {
        self.last_connected.map(|t| t.elapsed())
    }
}
