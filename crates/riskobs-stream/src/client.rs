//! WebSocket stream client with automatic reconnection.
//!
//! One client owns one logical session at a time. `connect` runs the
//! session loop until cancelled: each attempt dials the server, performs
//! the handshake, replays configured topic subscriptions, then pumps
//! frames until the transport drops. Unexpected closes trigger a
//! reconnect with exponential backoff; `disconnect` cancels the session
//! and returns the client to `Disconnected` without retrying.

use crate::buffer::MessageBuffer;
use crate::config::StreamConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{StreamError, StreamResult};
use crate::handle::StreamHandle;
use crate::message::{InboundFrame, OutboundFrame};
use crate::subscription::SubscriptionRegistry;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::connect_async_tls_with_config;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle of the client's single logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session, and none being attempted.
    Disconnected,
    /// A dial or handshake is in progress.
    Connecting,
    /// Handshake complete, frames flowing.
    Connected,
    /// Session lost, waiting out the backoff before redialing.
    Reconnecting,
    /// Last attempt failed with a non-close transport error.
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Server-acknowledged identity of the current session.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Identifier assigned by the server in `connection_established`.
    pub connection_id: String,
    /// Server timestamp of the acknowledgement.
    pub connected_at: chrono::DateTime<chrono::Utc>,
    /// Confirmed topics at the time of the snapshot.
    pub subscriptions: Vec<String>,
}

/// Capacity of the outbound frame channel.
const OUTBOUND_CHANNEL_SIZE: usize = 64;

/// Streaming client for the observatory WebSocket endpoint.
pub struct StreamClient {
    config: StreamConfig,
    state: Arc<RwLock<ConnectionState>>,
    info: Arc<RwLock<Option<ConnectionInfo>>>,
    registry: Arc<SubscriptionRegistry>,
    buffer: Arc<MessageBuffer>,
    active_connections: Arc<AtomicU64>,
    /// Lifetime reconnection attempts scheduled after unexpected closes.
    reconnect_attempts: Arc<AtomicU64>,
    /// Lifetime frames discarded by the dispatcher for failing to parse.
    discarded_frames: Arc<AtomicU64>,
    dispatcher: Dispatcher,
    outbound_tx: mpsc::Sender<OutboundFrame>,
    outbound_rx: Arc<TokioMutex<mpsc::Receiver<OutboundFrame>>>,
    /// Set while a `connect` call is driving the session loop.
    attempt_in_flight: Arc<AtomicBool>,
    /// Bumped per attempt and on disconnect; a mismatch marks an
    /// attempt as stale so it abandons its socket instead of racing a
    /// newer session.
    generation: Arc<AtomicU64>,
    /// Replaced on every `connect`, cancelled by `disconnect`.
    session_token: Arc<RwLock<CancellationToken>>,
}

impl StreamClient {
    /// Build a client. Received data frames are forwarded on `event_tx`
    /// in addition to being retained in the message buffer.
    pub fn new(config: StreamConfig, event_tx: mpsc::Sender<InboundFrame>) -> Self {
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        let info = Arc::new(RwLock::new(None));
        let registry = Arc::new(SubscriptionRegistry::new());
        let buffer = Arc::new(MessageBuffer::new(config.buffer_capacity));
        let active_connections = Arc::new(AtomicU64::new(0));
        let discarded_frames = Arc::new(AtomicU64::new(0));
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);

        let dispatcher = Dispatcher::new(
            info.clone(),
            registry.clone(),
            buffer.clone(),
            active_connections.clone(),
            discarded_frames.clone(),
            event_tx,
        );

        Self {
            config,
            state,
            info,
            registry,
            buffer,
            active_connections,
            reconnect_attempts: Arc::new(AtomicU64::new(0)),
            discarded_frames,
            dispatcher,
            outbound_tx,
            outbound_rx: Arc::new(TokioMutex::new(outbound_rx)),
            attempt_in_flight: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            session_token: Arc::new(RwLock::new(CancellationToken::new())),
        }
    }

    /// Run the session loop until disconnected or retries are exhausted.
    ///
    /// A second call while a session is already running is a no-op, so
    /// racing callers cannot open duplicate sockets.
    pub async fn connect(&self) -> StreamResult<()> {
        if self
            .attempt_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Connect already in flight, ignoring");
            return Ok(());
        }

        let token = CancellationToken::new();
        *self.session_token.write() = token.clone();

        let result = self.run_session(token).await;
        self.attempt_in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// Cancel the current session and clear all session state.
    ///
    /// Safe to call at any time; a subsequent `connect` starts fresh.
    pub async fn disconnect(&self) {
        info!("Disconnect requested");
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.session_token.read().cancel();
        self.clear_session_state();
        *self.state.write() = ConnectionState::Disconnected;
    }

    async fn run_session(&self, token: CancellationToken) -> StreamResult<()> {
        let mut attempt: u32 = 0;

        loop {
            *self.state.write() = ConnectionState::Connecting;
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

            match self.run_connection(generation, &token).await {
                Ok(()) => {}
                Err(StreamError::ConnectionClosed { code, reason }) => {
                    warn!(code, %reason, "Connection closed by server");
                }
                Err(e) => {
                    *self.state.write() = ConnectionState::Error;
                    error!(error = %e, "Connection attempt failed");
                }
            }

            self.clear_session_state();

            if token.is_cancelled() {
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            attempt += 1;
            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                *self.state.write() = ConnectionState::Error;
                return Err(StreamError::ConnectionFailed(format!(
                    "Gave up after {attempt} attempts"
                )));
            }

            self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
            *self.state.write() = ConnectionState::Reconnecting;
            let delay = self.reconnect_delay(attempt);
            info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting after delay");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = token.cancelled() => {
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
            }
        }
    }

    /// Dial, handshake, replay subscriptions, then pump frames.
    ///
    /// Returns `Ok` on a deliberate or clean exit and `Err` when the
    /// transport failed; the caller decides whether to retry.
    async fn run_connection(
        &self,
        generation: u64,
        token: &CancellationToken,
    ) -> StreamResult<()> {
        info!(url = %self.config.url, "Connecting to observatory stream");
        let (ws_stream, _) =
            connect_async_tls_with_config(&self.config.url, None, true, None).await?;

        // A disconnect or a newer attempt may have raced the dial; the
        // socket belongs to a dead session, drop it.
        if token.is_cancelled() || self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Stale connection attempt, abandoning socket");
            return Ok(());
        }

        let (mut write, mut read) = ws_stream.split();

        let handshake = OutboundFrame::connection_request(Uuid::new_v4().to_string());
        write
            .send(Message::Text(serde_json::to_string(&handshake)?))
            .await?;

        *self.state.write() = ConnectionState::Connected;
        info!("Transport established, handshake sent");

        // Configured topics are replayed on every session, not carried
        // over from the previous one.
        for topic in &self.config.topics {
            self.registry.mark_requested(topic);
            let frame = OutboundFrame::subscribe(topic);
            write
                .send(Message::Text(serde_json::to_string(&frame)?))
                .await?;
        }

        let mut outbound_rx = self.outbound_rx.lock().await;
        // Frames queued while no session was live belong to a dead
        // session; there is no outbound queueing across disconnects.
        drain_stale_outbound(&mut outbound_rx);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Session cancelled, closing transport");
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                outbound = outbound_rx.recv() => {
                    match outbound {
                        Some(frame) => {
                            write
                                .send(Message::Text(serde_json::to_string(&frame)?))
                                .await?;
                        }
                        // All senders dropped; nothing left to write.
                        None => return Ok(()),
                    }
                }
                inbound = read.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = self.dispatcher.dispatch(&text).await {
                                warn!(error = %e, "Discarding malformed frame");
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            write.send(Message::Pong(payload)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (u16::from(f.code), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            return Err(StreamError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            return Err(StreamError::ConnectionClosed {
                                code: 1006,
                                reason: "Stream ended".to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Drop per-session state after any close. Buffered frames and the
    /// lifetime counter survive; identity and subscriptions do not.
    fn clear_session_state(&self) {
        *self.info.write() = None;
        self.registry.clear();
    }

    /// Exponential backoff with a ceiling and a little jitter.
    fn reconnect_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        let base = self
            .config
            .reconnect_base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.config.reconnect_max_delay_ms);
        Duration::from_millis(base + jitter_ms())
    }

    /// Handle for sending frames and managing subscriptions.
    pub fn handle(&self) -> StreamHandle {
        StreamHandle::new(
            self.outbound_tx.clone(),
            self.state.clone(),
            self.registry.clone(),
        )
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Server-acknowledged session identity, with the current confirmed
    /// subscriptions filled in. `None` until the handshake is acked.
    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.info.read().clone().map(|mut info| {
            info.subscriptions = self.registry.confirmed();
            info
        })
    }

    /// Topics this deployment knows about; subscriptions are drawn from
    /// configuration, not discovered from the server.
    pub fn available_topics(&self) -> &[String] {
        &self.config.topics
    }

    /// Confirmed topics.
    pub fn subscriptions(&self) -> Vec<String> {
        self.registry.confirmed()
    }

    /// Requested-but-unconfirmed topics.
    pub fn pending_subscriptions(&self) -> Vec<String> {
        self.registry.pending()
    }

    /// Snapshot of the retained message window, oldest first.
    pub fn messages(&self) -> Vec<InboundFrame> {
        self.buffer.frames()
    }

    /// Lifetime count of received data frames.
    pub fn message_count(&self) -> u64 {
        self.buffer.message_count()
    }

    /// Server-wide connection count from the latest `system_stats`.
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Lifetime count of reconnection attempts scheduled after
    /// unexpected closes.
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Lifetime count of inbound frames discarded for failing to parse.
    pub fn discarded_frames(&self) -> u64 {
        self.discarded_frames.load(Ordering::Relaxed)
    }

    /// Drop the retained window and reset the lifetime counter.
    pub fn clear_messages(&self) {
        self.buffer.clear();
    }

    /// Queue a frame on the current session. Silently dropped when not
    /// connected.
    pub async fn send(&self, frame: OutboundFrame) -> StreamResult<()> {
        self.handle().send(frame).await
    }

    /// Request a topic subscription on the current session.
    pub async fn subscribe(&self, topic: &str) -> StreamResult<()> {
        self.handle().subscribe(topic).await
    }

    /// Drop a topic subscription on the current session.
    pub async fn unsubscribe(&self, topic: &str) -> StreamResult<()> {
        self.handle().unsubscribe(topic).await
    }
}

fn drain_stale_outbound(rx: &mut mpsc::Receiver<OutboundFrame>) {
    while rx.try_recv().is_ok() {}
}

fn jitter_ms() -> u64 {
    // Decorrelates simultaneous reconnects; no RNG dependency needed.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % 250)
        .unwrap_or(0)
}
