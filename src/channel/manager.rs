//! Channel Manager
//!
//! Owns the lifecycle of the single backend connection:
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──open──▶ Connected
//!      ▲                          │                    │
//!      └──── close/error ◀────────┴────────────────────┘
//!      │
//!      └── reconnect timer (at most one) ──▶ connect()
//! ```
//!
//! There is no terminal state: failures degrade to "disconnected, will
//! retry" for as long as the manager lives. Every connection attempt is
//! tagged with a generation; lifecycle events from a superseded generation
//! are ignored.

use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::backoff::ReconnectPolicy;
use super::envelope::Envelope;
use super::error::FrameError;
use super::transport::{Connection, Transport, TransportEvent};

/// Receives every inbound envelope that carries an event name
pub type InboundHandler = Arc<dyn Fn(&str, Value) + Send + Sync>;

/// Default number of consecutive failures before the channel reports itself degraded
pub const DEFAULT_CONNECTIVITY_LOST_AFTER: u32 = 10;

/// Lifecycle state of the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No live connection (initial state)
    #[default]
    Disconnected,
    /// A connection attempt is in flight
    Connecting,
    /// The transport confirmed the session is live
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Options for constructing a [`ChannelManager`]
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// WebSocket endpoint, e.g. `ws://localhost:8088/ws`
    pub endpoint: String,
    /// Delay policy between reconnect attempts
    pub reconnect: ReconnectPolicy,
    /// Consecutive failures before reporting degraded connectivity (None = never)
    pub connectivity_lost_after: Option<u32>,
}

impl ManagerOptions {
    /// Options with the default fixed reconnect delay
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reconnect: ReconnectPolicy::default(),
            connectivity_lost_after: Some(DEFAULT_CONNECTIVITY_LOST_AFTER),
        }
    }

    /// Override the reconnect policy
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

/// Manages the single connection to the backend.
///
/// Cheap to clone; all clones share one connection. Must be used from
/// within a tokio runtime.
#[derive(Clone)]
pub struct ChannelManager {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: String,
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    connectivity_lost_after: Option<u32>,
    state_tx: watch::Sender<ConnectionState>,
    slots: Mutex<Slots>,
    inbound: Mutex<Option<InboundHandler>>,
}

/// Mutable connection bookkeeping. State transitions happen while this is held.
#[derive(Default)]
struct Slots {
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    reconnect_timer: Option<PendingTimer>,
    timer_seq: u64,
    failures: u32,
    degraded: bool,
    shutdown: bool,
}

struct PendingTimer {
    seq: u64,
    handle: JoinHandle<()>,
}

impl fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelManager")
            .field("endpoint", &self.inner.endpoint)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ChannelManager {
    /// Create a manager. No connection is opened until [`connect`](Self::connect).
    pub fn new(transport: Arc<dyn Transport>, options: ManagerOptions) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                endpoint: options.endpoint,
                transport,
                policy: options.reconnect,
                connectivity_lost_after: options.connectivity_lost_after,
                state_tx,
                slots: Mutex::new(Slots::default()),
                inbound: Mutex::new(None),
            }),
        }
    }

    /// Install the handler that receives inbound events
    pub fn on_inbound(&self, handler: InboundHandler) {
        *self.inner.inbound.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Endpoint this manager connects to
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Observe state transitions
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Whether the channel is currently connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Failed attempts since the last successful open
    pub fn consecutive_failures(&self) -> u32 {
        self.lock_slots().failures
    }

    /// True once `connectivity_lost_after` consecutive attempts have failed.
    /// Cleared by the next successful open. Retrying continues regardless.
    pub fn is_degraded(&self) -> bool {
        self.lock_slots().degraded
    }

    /// Whether a reconnect attempt is currently scheduled
    pub fn has_pending_reconnect(&self) -> bool {
        self.lock_slots().reconnect_timer.is_some()
    }

    /// Open a connection unless one is already connected or connecting
    pub fn connect(&self) {
        let generation = {
            let mut slots = self.lock_slots();
            if slots.shutdown {
                return;
            }
            match self.state() {
                ConnectionState::Connected | ConnectionState::Connecting => return,
                ConnectionState::Disconnected => {}
            }

            slots.generation += 1;
            slots.outbound = None;
            self.set_state(ConnectionState::Connecting);
            slots.generation
        };

        tracing::debug!(
            endpoint = %self.inner.endpoint,
            generation,
            "Opening channel connection"
        );

        let manager = self.clone();
        tokio::spawn(async move {
            manager.drive(generation).await;
        });
    }

    /// Force an immediate attempt, bypassing any pending reconnect timer.
    /// No-op while connected or connecting.
    pub fn reconnect_now(&self) {
        {
            let mut slots = self.lock_slots();
            match self.state() {
                ConnectionState::Connected | ConnectionState::Connecting => return,
                ConnectionState::Disconnected => {}
            }
            if let Some(timer) = slots.reconnect_timer.take() {
                timer.handle.abort();
            }
        }

        tracing::info!(endpoint = %self.inner.endpoint, "Manual reconnect requested");
        self.connect();
    }

    /// Best-effort send: written only while connected, silently dropped otherwise
    pub fn send(&self, envelope: &Envelope) {
        let frame = match envelope.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(event = %envelope.event, error = %e, "Failed to encode envelope");
                return;
            }
        };

        let slots = self.lock_slots();
        let outbound = match (self.state(), slots.outbound.as_ref()) {
            (ConnectionState::Connected, Some(outbound)) => outbound,
            (state, _) => {
                tracing::trace!(event = %envelope.event, %state, "Dropping send while not connected");
                return;
            }
        };

        if outbound.send(frame).is_err() {
            tracing::debug!(event = %envelope.event, "Connection writer gone, send dropped");
        }
    }

    /// Resolve once the channel is connected (immediately if it already is)
    pub async fn wait_until_connected(&self) {
        let mut rx = self.inner.state_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|state| *state == ConnectionState::Connected).await;
    }

    /// Stop retrying and close the current connection.
    ///
    /// Queued frames are flushed before the socket closes. Resolves once the
    /// connection is down.
    pub async fn shutdown(&self) {
        {
            let mut slots = self.lock_slots();
            slots.shutdown = true;
            slots.outbound = None;
            if let Some(timer) = slots.reconnect_timer.take() {
                timer.handle.abort();
            }
            if self.state() != ConnectionState::Connected {
                slots.generation += 1;
                self.set_state(ConnectionState::Disconnected);
            }
        }

        let mut rx = self.inner.state_tx.subscribe();
        let _ = rx
            .wait_for(|state| *state == ConnectionState::Disconnected)
            .await;
        tracing::info!(endpoint = %self.inner.endpoint, "Channel shut down");
    }

    /// Run one connection attempt until it ends
    async fn drive(self, generation: u64) {
        let connection = match self.inner.transport.open(&self.inner.endpoint).await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!(endpoint = %self.inner.endpoint, error = %e, "Channel connection failed");
                self.handle_close(generation);
                return;
            }
        };

        let Connection {
            outbound,
            mut inbound,
        } = connection;

        if !self.handle_open(generation, outbound) {
            return;
        }

        while let Some(event) = inbound.recv().await {
            match event {
                TransportEvent::Frame(text) => self.handle_frame(&text),
                TransportEvent::Binary(bytes) => {
                    let e = FrameError::Binary(bytes.len());
                    tracing::warn!(error = %e, "Dropping malformed frame");
                }
                TransportEvent::Error(message) => {
                    // Error and close share one recovery path: drop the
                    // connection and fall through to handle_close.
                    tracing::warn!(error = %message, "Channel transport error, closing");
                    break;
                }
                TransportEvent::Closed => break,
            }
        }

        drop(inbound);
        self.handle_close(generation);
    }

    /// Transport confirmed the session. Returns false if the attempt was superseded.
    fn handle_open(&self, generation: u64, outbound: mpsc::UnboundedSender<String>) -> bool {
        let mut slots = self.lock_slots();
        if slots.generation != generation || slots.shutdown {
            tracing::debug!(generation, "Discarding superseded connection");
            return false;
        }

        slots.outbound = Some(outbound);
        if let Some(timer) = slots.reconnect_timer.take() {
            timer.handle.abort();
        }
        slots.failures = 0;
        slots.degraded = false;
        self.set_state(ConnectionState::Connected);

        tracing::info!(endpoint = %self.inner.endpoint, "Channel connected");
        true
    }

    fn handle_frame(&self, text: &str) {
        let envelope = match Envelope::parse(text) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                tracing::trace!("Ignoring frame without event name");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
                return;
            }
        };

        let handler = self
            .inner
            .inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match handler {
            Some(handler) => handler(&envelope.event, envelope.data),
            None => tracing::trace!(event = %envelope.event, "No inbound handler installed"),
        }
    }

    fn handle_close(&self, generation: u64) {
        let mut slots = self.lock_slots();
        if slots.generation != generation {
            return;
        }

        slots.outbound = None;
        self.set_state(ConnectionState::Disconnected);

        if slots.shutdown {
            return;
        }

        slots.failures = slots.failures.saturating_add(1);
        if let Some(limit) = self.inner.connectivity_lost_after {
            if slots.failures >= limit && !slots.degraded {
                slots.degraded = true;
                tracing::error!(
                    endpoint = %self.inner.endpoint,
                    failures = slots.failures,
                    "Channel connectivity lost, still retrying"
                );
            }
        }

        self.schedule_reconnect_locked(&mut slots);
    }

    /// Arm the reconnect timer unless one is already pending
    pub(crate) fn schedule_reconnect(&self) {
        let mut slots = self.lock_slots();
        self.schedule_reconnect_locked(&mut slots);
    }

    fn schedule_reconnect_locked(&self, slots: &mut Slots) {
        if slots.reconnect_timer.is_some() || slots.shutdown {
            return;
        }

        let delay = self.inner.policy.delay_for(slots.failures.saturating_sub(1));
        slots.timer_seq += 1;
        let seq = slots.timer_seq;

        tracing::info!(
            endpoint = %self.inner.endpoint,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Channel disconnected, reconnecting"
        );

        let manager = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut slots = manager.lock_slots();
                if slots.reconnect_timer.as_ref().map(|t| t.seq) == Some(seq) {
                    slots.reconnect_timer = None;
                }
            }
            manager.connect();
        });

        slots.reconnect_timer = Some(PendingTimer { seq, handle });
    }

    #[cfg(test)]
    fn pending_timer_seq(&self) -> Option<u64> {
        self.lock_slots().reconnect_timer.as_ref().map(|t| t.seq)
    }

    fn set_state(&self, state: ConnectionState) {
        self.inner.state_tx.send_replace(state);
    }

    fn lock_slots(&self) -> MutexGuard<'_, Slots> {
        self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::transport::fake::{FakeRemote, FakeTransport};
    use crate::channel::TransportError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn options(delay: Duration) -> ManagerOptions {
        ManagerOptions::new("ws://test/ws").reconnect(ReconnectPolicy::fixed(delay))
    }

    async fn wait_state(manager: &ChannelManager, state: ConnectionState) {
        let mut rx = manager.watch_state();
        rx.wait_for(|s| *s == state).await.unwrap();
    }

    /// Manager connected to a fake remote, with inbound events forwarded to a channel
    async fn connected(
        delay: Duration,
    ) -> (
        ChannelManager,
        FakeRemote,
        Arc<FakeTransport>,
        mpsc::UnboundedReceiver<FakeRemote>,
        mpsc::UnboundedReceiver<(String, Value)>,
    ) {
        let (transport, mut remotes) = FakeTransport::new();
        let manager = ChannelManager::new(transport.clone(), options(delay));

        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        manager.on_inbound(Arc::new(move |event: &str, data: Value| {
            let _ = seen_tx.send((event.to_string(), data));
        }));

        manager.connect();
        let remote = remotes.recv().await.unwrap();
        manager.wait_until_connected().await;

        (manager, remote, transport, remotes, seen_rx)
    }

    /// Holds every `open` until the test releases it
    struct GatedTransport {
        inner: Arc<FakeTransport>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn open(&self, endpoint: &str) -> Result<Connection, TransportError> {
            self.release.notified().await;
            self.inner.open(endpoint).await
        }
    }

    #[tokio::test]
    async fn test_initial_state_is_disconnected() {
        let (transport, _remotes) = FakeTransport::new();
        let manager = ChannelManager::new(transport, options(Duration::from_secs(3)));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.has_pending_reconnect());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (manager, _remote, transport, _remotes, _seen) =
            connected(Duration::from_secs(3)).await;

        manager.connect();
        manager.connect();
        assert_eq!(transport.open_count(), 1);
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_ping_frame_dispatched_once() {
        let (_manager, remote, _transport, _remotes, mut seen) =
            connected(Duration::from_secs(3)).await;

        remote.frame(r#"{"event":"ping","data":null}"#);
        let (event, data) = seen.recv().await.unwrap();
        assert_eq!(event, "ping");
        assert_eq!(data, Value::Null);
        assert!(seen.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_frame_dropped_and_stays_connected() {
        let (manager, remote, _transport, _remotes, mut seen) =
            connected(Duration::from_secs(3)).await;

        remote.frame("not json");
        remote.frame(r#"{"data":1}"#);
        remote.frame(r#"{"event":"after","data":2}"#);

        // Frames are processed in order, so the first delivery is the valid one.
        let (event, data) = seen.recv().await.unwrap();
        assert_eq!(event, "after");
        assert_eq!(data, json!(2));
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(!manager.has_pending_reconnect());
    }

    #[tokio::test]
    async fn test_send_while_connected_writes_frame() {
        let (manager, mut remote, _transport, _remotes, _seen) =
            connected(Duration::from_secs(3)).await;

        manager.send(&Envelope::new("x", json!({"a": 1})));
        assert_eq!(remote.sent.recv().await.unwrap(), r#"{"event":"x","data":{"a":1}}"#);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_dropped() {
        let (transport, _remotes) = FakeTransport::new();
        let manager = ChannelManager::new(transport.clone(), options(Duration::from_secs(3)));

        manager.send(&Envelope::new("x", json!(1)));
        assert_eq!(transport.open_count(), 0);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_after_close_is_dropped() {
        let (manager, mut remote, _transport, _remotes, _seen) =
            connected(Duration::from_secs(3)).await;

        remote.close();
        wait_state(&manager, ConnectionState::Disconnected).await;

        manager.send(&Envelope::new("x", json!(1)));
        // The old writer queue is released without ever seeing the frame
        assert!(remote.sent.recv().await.is_none());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_close_arms_exactly_one_timer() {
        let (manager, remote, transport, mut remotes, _seen) =
            connected(Duration::from_secs(3)).await;

        remote.close();
        wait_state(&manager, ConnectionState::Disconnected).await;
        assert!(manager.has_pending_reconnect());
        let seq = manager.pending_timer_seq();

        // A manual connect during the pending window opens a new attempt
        // but must not arm a second timer.
        transport.refuse.store(true, Ordering::SeqCst);
        manager.connect();
        wait_state(&manager, ConnectionState::Disconnected).await;
        assert_eq!(manager.pending_timer_seq(), seq);

        manager.schedule_reconnect();
        assert_eq!(manager.pending_timer_seq(), seq);
        assert!(remotes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_error_normalized_into_close() {
        let (manager, remote, _transport, _remotes, _seen) =
            connected(Duration::from_secs(3)).await;

        remote.error("connection reset");
        wait_state(&manager, ConnectionState::Disconnected).await;
        assert!(manager.has_pending_reconnect());
        assert_eq!(manager.consecutive_failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_fixed_delay() {
        let (manager, remote, transport, mut remotes, _seen) =
            connected(Duration::from_secs(3)).await;

        let closed_at = tokio::time::Instant::now();
        remote.close();

        let _second = remotes.recv().await.unwrap();
        assert!(closed_at.elapsed() >= Duration::from_secs(3));
        manager.wait_until_connected().await;
        assert_eq!(transport.open_count(), 2);
        assert!(!manager.has_pending_reconnect());
        assert_eq!(manager.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_forever_and_reports_degraded() {
        let (transport, _remotes) = FakeTransport::new();
        transport.refuse.store(true, Ordering::SeqCst);
        let mut opts = options(Duration::from_secs(3));
        opts.connectivity_lost_after = Some(3);
        let manager = ChannelManager::new(transport.clone(), opts);

        manager.connect();
        tokio::time::sleep(Duration::from_secs(3 * 5 + 1)).await;

        assert!(transport.open_count() >= 5);
        assert!(manager.is_degraded());
        assert!(manager.has_pending_reconnect());
    }

    #[tokio::test]
    async fn test_reconnect_now_bypasses_timer() {
        let (manager, remote, transport, mut remotes, _seen) =
            connected(Duration::from_secs(3600)).await;

        remote.close();
        wait_state(&manager, ConnectionState::Disconnected).await;
        assert!(manager.has_pending_reconnect());

        manager.reconnect_now();
        let _second = remotes.recv().await.unwrap();
        manager.wait_until_connected().await;
        assert_eq!(transport.open_count(), 2);
        assert!(!manager.has_pending_reconnect());
    }

    #[tokio::test]
    async fn test_reconnect_now_noop_while_connected() {
        let (manager, _remote, transport, _remotes, _seen) =
            connected(Duration::from_secs(3)).await;

        manager.reconnect_now();
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_multiple_waiters_resolve_on_connect() {
        let (transport, mut remotes) = FakeTransport::new();
        let manager = ChannelManager::new(transport, options(Duration::from_secs(3)));

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.wait_until_connected().await })
            })
            .collect();

        manager.connect();
        let _remote = remotes.recv().await.unwrap();
        for waiter in waiters {
            waiter.await.unwrap();
        }

        // Already connected: resolves immediately
        manager.wait_until_connected().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_retrying() {
        let (manager, mut remote, _transport, _remotes, _seen) =
            connected(Duration::from_secs(3)).await;

        let shutdown = tokio::spawn({
            let manager = manager.clone();
            async move { manager.shutdown().await }
        });

        // Outbound queue is released first; then the remote acknowledges the close.
        assert!(remote.sent.recv().await.is_none());
        remote.close();
        shutdown.await.unwrap();

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.has_pending_reconnect());
        manager.connect();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_shutdown_while_connecting_discards_late_open() {
        let (fake, mut remotes) = FakeTransport::new();
        let release = Arc::new(Notify::new());
        let transport = Arc::new(GatedTransport {
            inner: fake.clone(),
            release: release.clone(),
        });
        let manager = ChannelManager::new(transport, options(Duration::from_secs(3)));

        manager.connect();
        assert_eq!(manager.state(), ConnectionState::Connecting);

        manager.shutdown().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        // The superseded attempt completes after shutdown and is thrown away
        release.notify_one();
        let mut remote = remotes.recv().await.unwrap();
        assert!(remote.sent.recv().await.is_none());

        assert_eq!(fake.open_count(), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.has_pending_reconnect());
        assert_eq!(manager.consecutive_failures(), 0);
    }
}
