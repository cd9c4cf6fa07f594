//! Inbound frame routing.
//!
//! Each text frame is parsed once and routed by its `type` field. The
//! three control types update client state and stop there; every other
//! frame is buffered, counted, and forwarded downstream. A frame that
//! fails to parse is discarded by the caller without touching any state.

use crate::buffer::MessageBuffer;
use crate::client::ConnectionInfo;
use crate::error::StreamResult;
use crate::message::{
    frame_type, ConnectionEstablished, InboundFrame, SubscriptionConfirmed, SystemStats,
};
use crate::subscription::SubscriptionRegistry;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Routes inbound frames to the client's internal state and to consumers.
pub struct Dispatcher {
    info: Arc<RwLock<Option<ConnectionInfo>>>,
    registry: Arc<SubscriptionRegistry>,
    buffer: Arc<MessageBuffer>,
    /// Last figure reported by the server, not locally computed.
    active_connections: Arc<AtomicU64>,
    /// Lifetime count of frames discarded for failing to parse.
    discarded: Arc<AtomicU64>,
    event_tx: mpsc::Sender<InboundFrame>,
}

impl Dispatcher {
    pub fn new(
        info: Arc<RwLock<Option<ConnectionInfo>>>,
        registry: Arc<SubscriptionRegistry>,
        buffer: Arc<MessageBuffer>,
        active_connections: Arc<AtomicU64>,
        discarded: Arc<AtomicU64>,
        event_tx: mpsc::Sender<InboundFrame>,
    ) -> Self {
        Self {
            info,
            registry,
            buffer,
            active_connections,
            discarded,
            event_tx,
        }
    }

    /// Parse and route one frame.
    ///
    /// Errors are per-frame: the caller logs and moves on, so a malformed
    /// frame never tears down the connection or reaches the buffer. Each
    /// failure bumps the discard counter.
    pub async fn dispatch(&self, text: &str) -> StreamResult<()> {
        let result = self.route(text).await;
        if result.is_err() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    async fn route(&self, text: &str) -> StreamResult<()> {
        let frame: InboundFrame = serde_json::from_str(text)?;

        if !frame.is_control() {
            // Data frame: retain and forward, no inspection.
            self.buffer.append(frame.clone());
            if self.event_tx.send(frame).await.is_err() {
                warn!("Event receiver dropped");
            }
            return Ok(());
        }

        match frame.kind.as_str() {
            frame_type::CONNECTION_ESTABLISHED => {
                let payload: ConnectionEstablished = serde_json::from_value(frame.data)?;
                info!(connection_id = %payload.connection_id, "Connection acknowledged by server");
                *self.info.write() = Some(ConnectionInfo {
                    connection_id: payload.connection_id,
                    connected_at: payload.timestamp,
                    subscriptions: Vec::new(),
                });
                Ok(())
            }
            frame_type::SUBSCRIPTION_CONFIRMED => {
                let payload: SubscriptionConfirmed = serde_json::from_value(frame.data)?;
                debug!(topic = %payload.topic, "Subscription confirmed");
                self.registry.confirm(&payload.topic);
                Ok(())
            }
            frame_type::SYSTEM_STATS => {
                let payload: SystemStats = serde_json::from_value(frame.data)?;
                self.active_connections
                    .store(payload.active_connections, Ordering::Relaxed);
                Ok(())
            }
            other => unreachable!("is_control admits only the three control kinds, got {other}"),
        }
    }
}
