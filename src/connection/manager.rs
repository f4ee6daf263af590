//! The reconnecting connection state machine.

use std::collections::VecDeque;

use bytes::Bytes;
use tracing::{debug, error, warn};

use crate::error::{ClientError, ConnectionError, Result};

use super::classify::{ErrorClass, TransportErrorKind};
use super::config::{ClientConfig, Endpoint, RetryCounting};
use super::state::{ConnectionState, ConnectionStats};
use super::timer::{Timer, TimerKind};
use super::transport::{Transport, TransportFactory, TransportState};
use super::writer::write_all;

/// Events emitted to the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The lifecycle ended with a failure.
    Error(ConnectionError),
    /// The lifecycle ended gracefully.
    Done,
    /// New bytes can be drained with [`ConnectionManager::read`].
    Readable,
    /// Bytes from the last write have all been handed to the transport.
    WriteDrained,
}

impl ClientEvent {
    /// Check if this event ends the lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientEvent::Error(_) | ClientEvent::Done)
    }
}

/// Owns one outbound connection and drives it through
/// connect, protocol-active and stop/retry.
///
/// The manager never blocks and never calls into the transport's
/// notification machinery. A driver feeds it notifications through the
/// `handle_*` methods and drains the resulting [`ClientEvent`]s with
/// [`poll_event`](Self::poll_event). Between two calls its state is
/// quiescent and safe to inspect.
pub struct ConnectionManager<F: TransportFactory, Tm: Timer> {
    /// Target endpoint.
    endpoint: Endpoint,
    /// Client configuration.
    config: ClientConfig,
    /// Current connection state.
    state: ConnectionState,
    /// Builds a transport when none is held.
    factory: F,
    /// Live transport handle.
    transport: Option<F::Transport>,
    connect_timer: Tm,
    reconnect_timer: Tm,
    /// Attempt counter, see [`RetryCounting`].
    attempts: u32,
    /// Whether read/write notifications are forwarded.
    subscribed: bool,
    /// A write is waiting for the transport to flush.
    drain_pending: bool,
    events: VecDeque<ClientEvent>,
    stats: ConnectionStats,
}

impl<F: TransportFactory, Tm: Timer> ConnectionManager<F, Tm> {
    /// Create an idle manager.
    pub fn new(
        endpoint: Endpoint,
        config: ClientConfig,
        factory: F,
        connect_timer: Tm,
        reconnect_timer: Tm,
    ) -> Self {
        Self {
            endpoint,
            config,
            state: ConnectionState::Idle,
            factory,
            transport: None,
            connect_timer,
            reconnect_timer,
            attempts: 0,
            subscribed: false,
            drain_pending: false,
            events: VecDeque::new(),
            stats: ConnectionStats::default(),
        }
    }

    /// Get the target endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get the attempt counter.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Check if read/write notifications are being forwarded.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Get connection statistics.
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Timer bounding a single connect attempt.
    pub fn connect_timer(&self) -> &Tm {
        &self.connect_timer
    }

    /// Timer pausing between attempts.
    pub fn reconnect_timer(&self) -> &Tm {
        &self.reconnect_timer
    }

    /// Get the transport handle, if one has been built.
    pub fn transport(&self) -> Option<&F::Transport> {
        self.transport.as_ref()
    }

    /// Get the transport handle mutably, for drivers that poll it.
    pub fn transport_mut(&mut self) -> Option<&mut F::Transport> {
        self.transport.as_mut()
    }

    /// Take the next pending event.
    pub fn poll_event(&mut self) -> Option<ClientEvent> {
        self.events.pop_front()
    }

    /// Begin (or resume) connecting.
    ///
    /// Re-entrant: while an attempt is in flight this does nothing, and if
    /// the transport is already connected the protocol starts without a new
    /// connect call. Called after [`stop`](Self::stop) or a failure, it opens
    /// a new lifecycle with a freshly built transport.
    pub fn start(&mut self) {
        match self.state {
            ConnectionState::ProtocolActive => {
                debug!(endpoint = %self.endpoint, "start: protocol already active");
            }
            ConnectionState::Stopped | ConnectionState::Failed => {
                debug!(endpoint = %self.endpoint, previous = ?self.state, "start: new lifecycle");
                self.transport = None;
                self.attempts = 0;
                self.begin_attempt();
            }
            ConnectionState::Idle | ConnectionState::Connecting => self.begin_attempt(),
        }
    }

    /// Tear the connection down and emit [`ClientEvent::Done`].
    ///
    /// No-op before the first start and after the lifecycle has ended.
    pub fn stop(&mut self) {
        match self.state {
            ConnectionState::Idle | ConnectionState::Stopped | ConnectionState::Failed => {
                debug!(state = ?self.state, "stop: nothing to stop");
            }
            ConnectionState::Connecting | ConnectionState::ProtocolActive => {
                self.terminate(ConnectionState::Stopped, ClientEvent::Done);
            }
        }
    }

    /// Write `buf` to the transport.
    ///
    /// Emits [`ClientEvent::WriteDrained`] once the transport has nothing
    /// left to flush. On failure the remainder of `buf` is dropped and the
    /// error reports how much was accepted.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.state.is_active() {
            return Err(ClientError::NotConnected);
        }
        let transport = self.transport.as_mut().ok_or(ClientError::NotConnected)?;
        if buf.is_empty() {
            return Ok(0);
        }

        let written = match write_all(transport, buf) {
            Ok(written) => written,
            Err(err) => {
                self.stats.bytes_sent += err.written as u64;
                return Err(err.into());
            }
        };
        self.stats.record_send(written);

        if transport.bytes_to_write() == 0 {
            self.drain_pending = false;
            self.events.push_back(ClientEvent::WriteDrained);
        } else {
            self.drain_pending = true;
        }
        Ok(written)
    }

    /// Drain the bytes received so far.
    pub fn read(&mut self) -> Result<Bytes> {
        if !self.state.is_active() {
            return Err(ClientError::NotConnected);
        }
        let transport = self.transport.as_mut().ok_or(ClientError::NotConnected)?;

        let data = transport.read_available();
        self.stats.record_receive(data.len());
        Ok(data)
    }

    /// Notification: the transport changed state.
    pub fn handle_state_changed(&mut self, new_state: TransportState) {
        debug!(state = ?self.state, transport = ?new_state, "transport state changed");

        match (self.state, new_state) {
            (ConnectionState::Connecting, TransportState::Connected) => {
                if self.config.retry_policy.allows(self.attempts) {
                    self.protocol_start();
                } else {
                    let max = self.config.retry_policy.max_retries;
                    self.fail(ConnectionError::MaxRetriesExceeded { max });
                }
            }
            (ConnectionState::Connecting, TransportState::Unconnected) => self.attempt_closed(),
            (ConnectionState::ProtocolActive, TransportState::Unconnected) => {
                self.protocol_stop();
                if self.config.auto_reconnect {
                    self.schedule_reconnect();
                } else {
                    self.terminate(ConnectionState::Stopped, ClientEvent::Done);
                }
            }
            _ => {}
        }
    }

    /// Notification: the transport reported an error.
    pub fn handle_error(&mut self, kind: TransportErrorKind) {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::ProtocolActive
        ) {
            debug!(%kind, state = ?self.state, "transport error ignored");
            return;
        }

        match kind.class() {
            ErrorClass::Ignorable => debug!(%kind, "ignorable transport condition"),
            ErrorClass::HostUnreachable => {
                warn!(endpoint = %self.endpoint, "host not found");
                self.fail(ConnectionError::HostNotFound {
                    endpoint: self.endpoint.clone(),
                });
            }
            ErrorClass::Fatal => {
                error!(%kind, "bad socket error, aborting");
                self.fail(ConnectionError::FatalTransport(kind));
            }
            ErrorClass::Unknown => {
                error!(%kind, "unknown socket error, aborting");
                self.fail(ConnectionError::UnknownTransport(kind));
            }
        }
    }

    /// Notification: one of the timers expired.
    ///
    /// Expiry of a timer that is no longer armed is stale and ignored.
    pub fn handle_timeout(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::ConnectTimeout => {
                if !self.connect_timer.is_armed() {
                    return;
                }
                self.connect_timer.cancel();
                if self.state.is_connecting() {
                    self.fail(ConnectionError::ConnectTimeout);
                }
            }
            TimerKind::ReconnectSleep => {
                if !self.reconnect_timer.is_armed() {
                    return;
                }
                self.reconnect_timer.cancel();
                if self.state.is_connecting() {
                    self.begin_attempt();
                }
            }
        }
    }

    /// Notification: the transport has bytes to read.
    pub fn handle_readable(&mut self) {
        if self.subscribed {
            self.events.push_back(ClientEvent::Readable);
        }
    }

    /// Notification: the transport flushed queued bytes.
    pub fn handle_writable(&mut self) {
        if !self.subscribed || !self.drain_pending {
            return;
        }
        if self.transport.as_ref().is_some_and(|t| t.bytes_to_write() == 0) {
            self.drain_pending = false;
            self.events.push_back(ClientEvent::WriteDrained);
        }
    }

    fn begin_attempt(&mut self) {
        if self.transport.is_none() {
            self.transport = Some(self.factory.build());
        }

        let policy = &self.config.retry_policy;
        if !policy.allows(self.attempts) {
            let max = policy.max_retries;
            self.fail(ConnectionError::MaxRetriesExceeded { max });
            return;
        }

        self.reconnect_timer.cancel();
        if !self.connect_timer.is_armed() {
            self.connect_timer.arm(self.config.retry_policy.connect_timeout);
        }
        self.state = ConnectionState::Connecting;

        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        match transport.state() {
            TransportState::Unconnected => {
                debug!(endpoint = %self.endpoint, attempts = self.attempts, "connecting");
                self.stats.record_attempt();
                transport.connect(&self.endpoint);
            }
            TransportState::Connected => self.protocol_start(),
            other => debug!(transport = ?other, "attempt already in flight"),
        }
    }

    /// A connect attempt ended without reaching the protocol.
    fn attempt_closed(&mut self) {
        if self.reconnect_timer.is_armed() {
            return;
        }
        if self.config.retry_policy.counting == RetryCounting::CountFailures {
            self.attempts += 1;
        }

        if self.config.auto_reconnect {
            self.schedule_reconnect();
        } else {
            debug!(endpoint = %self.endpoint, "closed before protocol start");
            self.stop_timers();
            self.state = ConnectionState::Idle;
        }
    }

    fn schedule_reconnect(&mut self) {
        let sleep = self.config.retry_policy.reconnect_sleep;
        debug!(?sleep, attempts = self.attempts, "reconnect scheduled");

        self.connect_timer.cancel();
        self.reconnect_timer.arm(sleep);
        self.state = ConnectionState::Connecting;
        self.stats.record_reconnect();
    }

    fn protocol_start(&mut self) {
        self.stop_timers();
        match self.config.retry_policy.counting {
            RetryCounting::CountSessions => self.attempts += 1,
            RetryCounting::CountFailures => self.attempts = 0,
        }
        self.subscribed = true;
        self.state = ConnectionState::ProtocolActive;
        self.stats.record_connect();
        debug!(endpoint = %self.endpoint, attempts = self.attempts, "protocol started");
    }

    fn protocol_stop(&mut self) {
        self.subscribed = false;
        self.drain_pending = false;
        if self.config.retry_policy.counting == RetryCounting::CountSessions {
            self.attempts = self.attempts.saturating_sub(1);
        }
        if let Some(transport) = self.transport.as_mut() {
            transport.abort();
        }
        self.stats.record_disconnect();
        debug!(endpoint = %self.endpoint, "protocol stopped");
    }

    fn fail(&mut self, err: ConnectionError) {
        self.terminate(ConnectionState::Failed, ClientEvent::Error(err));
    }

    /// Single exit to a terminal state; emits `event` at most once per lifecycle.
    fn terminate(&mut self, to: ConnectionState, event: ClientEvent) {
        if self.state.is_terminal() {
            debug!(state = ?self.state, ?event, "already terminal, event dropped");
            return;
        }

        if self.subscribed {
            self.protocol_stop();
        }
        self.stop_timers();
        if let Some(transport) = self.transport.as_mut() {
            if transport.state() != TransportState::Unconnected {
                transport.abort();
            }
        }

        if to == ConnectionState::Failed {
            self.stats.record_failure();
        }
        self.state = to;
        self.events.push_back(event);
    }

    fn stop_timers(&mut self) {
        self.connect_timer.cancel();
        self.reconnect_timer.cancel();
    }
}

impl<F: TransportFactory, Tm: Timer> std::fmt::Debug for ConnectionManager<F, Tm> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .field("subscribed", &self.subscribed)
            .finish()
    }
}
