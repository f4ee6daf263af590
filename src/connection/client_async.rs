//! Async client driving a connection manager on its own tokio task.

use std::io;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::transport_async::{TcpTransport, TransportEvent};

use super::config::{ClientConfig, Endpoint};
use super::manager::{ClientEvent, ConnectionManager};
use super::state::{ConnectionState, ConnectionStats};
use super::timer::{DeadlineTimer, TimerKind};
use super::transport::TransportState;

type TcpManager = ConnectionManager<fn() -> TcpTransport, DeadlineTimer>;

enum Command {
    Start,
    Stop,
    Write(Bytes, oneshot::Sender<Result<usize>>),
    Read(oneshot::Sender<Result<Bytes>>),
    State(oneshot::Sender<ConnectionState>),
    Stats(oneshot::Sender<ConnectionStats>),
}

/// Handle to a reconnecting TCP connection.
///
/// The connection state machine runs on a dedicated task; every
/// notification and command is processed there, one at a time. Events are
/// delivered in order through [`next_event`](Self::next_event). Dropping the
/// handle stops the connection and ends the task.
pub struct AsyncClient {
    endpoint: Endpoint,
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    task: JoinHandle<()>,
}

impl AsyncClient {
    /// Spawn the connection task. Does not connect until [`start`](Self::start).
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(endpoint: Endpoint, config: ClientConfig) -> Self {
        let manager = ConnectionManager::new(
            endpoint.clone(),
            config,
            TcpTransport::new as fn() -> TcpTransport,
            DeadlineTimer::new(),
            DeadlineTimer::new(),
        );
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(manager, command_rx, event_tx));

        Self {
            endpoint,
            commands: command_tx,
            events: event_rx,
            task,
        }
    }

    /// Get the target endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Begin connecting.
    pub fn start(&self) -> Result<()> {
        self.send(Command::Start)
    }

    /// Stop the connection.
    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// Write bytes to the active session.
    pub async fn write(&self, data: impl Into<Bytes>) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Write(data.into(), tx))?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Drain bytes received so far.
    pub async fn read(&self) -> Result<Bytes> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Read(tx))?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Get the current connection state.
    pub async fn state(&self) -> Result<ConnectionState> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::State(tx))?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Get a snapshot of the connection statistics.
    pub async fn stats(&self) -> Result<ConnectionStats> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stats(tx))?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Wait for the next event. Returns `None` once the task has exited.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    /// Stop the connection and wait for the task to exit.
    pub async fn shutdown(self) -> Result<()> {
        let Self { commands, task, .. } = self;
        drop(commands);
        task.await.map_err(io::Error::from)?;
        Ok(())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| ClientError::Closed)
    }
}

impl std::fmt::Debug for AsyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncClient")
            .field("endpoint", &self.endpoint)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

async fn run(
    mut manager: TcpManager,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ClientEvent>,
) {
    loop {
        // The handle may stop listening before it stops commanding.
        while let Some(event) = manager.poll_event() {
            let _ = events.send(event);
        }

        let connect_deadline = manager.connect_timer().deadline();
        let reconnect_deadline = manager.reconnect_timer().deadline();

        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => handle_command(&mut manager, command),
                None => {
                    manager.stop();
                    break;
                }
            },
            event = transport_event(manager.transport_mut()) => apply(&mut manager, event),
            () = expire(connect_deadline) => manager.handle_timeout(TimerKind::ConnectTimeout),
            () = expire(reconnect_deadline) => manager.handle_timeout(TimerKind::ReconnectSleep),
        }
    }

    while let Some(event) = manager.poll_event() {
        let _ = events.send(event);
    }
    debug!(endpoint = %manager.endpoint(), "connection task finished");
}

fn handle_command(manager: &mut TcpManager, command: Command) {
    match command {
        Command::Start => manager.start(),
        Command::Stop => manager.stop(),
        Command::Write(data, reply) => {
            let _ = reply.send(manager.write(&data));
        }
        Command::Read(reply) => {
            let _ = reply.send(manager.read());
        }
        Command::State(reply) => {
            let _ = reply.send(manager.state());
        }
        Command::Stats(reply) => {
            let _ = reply.send(manager.stats().clone());
        }
    }
}

fn apply(manager: &mut TcpManager, event: TransportEvent) {
    match event {
        TransportEvent::StateChanged(state) => manager.handle_state_changed(state),
        TransportEvent::Error(kind) => {
            manager.handle_error(kind);
            manager.handle_state_changed(TransportState::Unconnected);
        }
        TransportEvent::Readable => manager.handle_readable(),
        TransportEvent::Drained => manager.handle_writable(),
    }
}

async fn transport_event(transport: Option<&mut TcpTransport>) -> TransportEvent {
    match transport {
        Some(transport) => transport.next_event().await,
        None => std::future::pending().await,
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::RetryCounting;
    use crate::error::ConnectionError;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn wait_for_state(client: &AsyncClient, expected: ConnectionState) {
        timeout(WAIT, async {
            while client.state().await.unwrap() != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    async fn next(client: &mut AsyncClient) -> ClientEvent {
        timeout(WAIT, client.next_event()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut client = AsyncClient::spawn(Endpoint::new("127.0.0.1", port), ClientConfig::simple());
        client.start().unwrap();

        let (mut peer, _) = listener.accept().await.unwrap();
        wait_for_state(&client, ConnectionState::ProtocolActive).await;

        assert_eq!(client.write(&b"PING"[..]).await.unwrap(), 4);
        assert_eq!(next(&mut client).await, ClientEvent::WriteDrained);

        let mut buf = [0u8; 4];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PING");

        peer.write_all(b"PONG").await.unwrap();
        assert_eq!(next(&mut client).await, ClientEvent::Readable);
        assert_eq!(client.read().await.unwrap().as_ref(), b"PONG");

        drop(peer);
        assert_eq!(next(&mut client).await, ClientEvent::Done);
        assert_eq!(client.state().await.unwrap(), ConnectionState::Stopped);

        client.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_until_max_retries() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ClientConfig::robust()
            .with_max_retries(3)
            .with_connect_timeout(Duration::from_secs(2))
            .with_reconnect_sleep(Duration::from_millis(10))
            .with_counting(RetryCounting::CountFailures);
        let mut client = AsyncClient::spawn(Endpoint::new("127.0.0.1", port), config);
        client.start().unwrap();

        assert_eq!(
            next(&mut client).await,
            ClientEvent::Error(ConnectionError::MaxRetriesExceeded { max: 3 })
        );
        let stats = client.stats().await.unwrap();
        assert_eq!(stats.connect_attempts, 3);
        assert_eq!(client.state().await.unwrap(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_stop_emits_done_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut client = AsyncClient::spawn(Endpoint::new("127.0.0.1", port), ClientConfig::simple());
        client.start().unwrap();
        let _peer = listener.accept().await.unwrap();
        wait_for_state(&client, ConnectionState::ProtocolActive).await;

        client.stop().unwrap();
        client.stop().unwrap();

        assert_eq!(next(&mut client).await, ClientEvent::Done);
        assert!(timeout(Duration::from_millis(50), client.next_event()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_on_silent_endpoint() {
        let config = ClientConfig::simple().with_connect_timeout(Duration::from_millis(100));
        let mut client = AsyncClient::spawn(Endpoint::new("10.255.255.1", 9999), config);
        let started = Instant::now();
        client.start().unwrap();

        assert_eq!(
            next(&mut client).await,
            ClientEvent::Error(ConnectionError::ConnectTimeout)
        );
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(200), "{elapsed:?}");
        assert_eq!(client.state().await.unwrap(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_unbounded_timeouts_keep_task_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let config = ClientConfig::simple()
            .with_connect_timeout(Duration::MAX)
            .with_reconnect_sleep(Duration::MAX);
        let mut client = AsyncClient::spawn(Endpoint::new("127.0.0.1", port), config);
        client.start().unwrap();

        let _peer = listener.accept().await.unwrap();
        wait_for_state(&client, ConnectionState::ProtocolActive).await;

        client.stop().unwrap();
        assert_eq!(next(&mut client).await, ClientEvent::Done);
        assert_eq!(client.state().await.unwrap(), ConnectionState::Stopped);
    }

    #[tokio::test]
    async fn test_write_before_start() {
        let client = AsyncClient::spawn(Endpoint::new("127.0.0.1", 9), ClientConfig::simple());
        assert!(matches!(
            client.write(&b"PING"[..]).await,
            Err(ClientError::NotConnected)
        ));
        assert_eq!(client.state().await.unwrap(), ConnectionState::Idle);
        client.shutdown().await.unwrap();
    }
}
