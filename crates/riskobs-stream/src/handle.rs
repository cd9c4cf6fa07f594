//! Cheap, cloneable sending surface for the stream client.
//!
//! The handle owns nothing but channel ends and shared state, so
//! consumers can hold it across reconnects. All sends are best-effort:
//! when the client is not connected, frames are dropped silently rather
//! than queued for later delivery.

use crate::client::ConnectionState;
use crate::error::StreamResult;
use crate::message::OutboundFrame;
use crate::subscription::SubscriptionRegistry;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Write-side handle to an active stream session.
#[derive(Clone)]
pub struct StreamHandle {
    outbound_tx: mpsc::Sender<OutboundFrame>,
    state: Arc<RwLock<ConnectionState>>,
    registry: Arc<SubscriptionRegistry>,
}

impl StreamHandle {
    pub(crate) fn new(
        outbound_tx: mpsc::Sender<OutboundFrame>,
        state: Arc<RwLock<ConnectionState>>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            outbound_tx,
            state,
            registry,
        }
    }

    /// Whether frames sent now would reach the server.
    pub fn is_connected(&self) -> bool {
        *self.state.read() == ConnectionState::Connected && !self.outbound_tx.is_closed()
    }

    /// Queue a frame for the writer task.
    ///
    /// Dropped silently when not connected. There is no outbound queue
    /// across sessions; callers re-issue requests after reconnect.
    pub async fn send(&self, frame: OutboundFrame) -> StreamResult<()> {
        if !self.is_connected() {
            debug!(kind = %frame.kind, "Not connected, dropping outbound frame");
            return Ok(());
        }
        if self.outbound_tx.send(frame).await.is_err() {
            debug!("Writer task gone, dropping outbound frame");
        }
        Ok(())
    }

    /// Request a topic subscription.
    ///
    /// The topic stays pending until the server confirms it.
    pub async fn subscribe(&self, topic: &str) -> StreamResult<()> {
        if !self.is_connected() {
            debug!(topic, "Not connected, dropping subscribe request");
            return Ok(());
        }
        self.registry.mark_requested(topic);
        self.send(OutboundFrame::subscribe(topic)).await
    }

    /// Drop a topic subscription.
    ///
    /// The topic is removed locally at once; no acknowledgement is
    /// awaited.
    pub async fn unsubscribe(&self, topic: &str) -> StreamResult<()> {
        if !self.is_connected() {
            debug!(topic, "Not connected, dropping unsubscribe request");
            return Ok(());
        }
        self.registry.remove(topic);
        self.send(OutboundFrame::unsubscribe(topic)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_with_state(
        state: ConnectionState,
    ) -> (StreamHandle, mpsc::Receiver<OutboundFrame>, Arc<SubscriptionRegistry>) {
        let (tx, rx) = mpsc::channel(16);
        let registry = Arc::new(SubscriptionRegistry::new());
        let handle = StreamHandle::new(tx, Arc::new(RwLock::new(state)), registry.clone());
        (handle, rx, registry)
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_silent_noop() {
        let (handle, mut rx, _) = handle_with_state(ConnectionState::Disconnected);

        handle.send(OutboundFrame::subscribe("risk_updates")).await.unwrap();

        assert!(!handle.is_connected());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_while_connected_queues_frame() {
        let (handle, mut rx, _) = handle_with_state(ConnectionState::Connected);

        handle.send(OutboundFrame::subscribe("risk_updates")).await.unwrap();

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.kind, "subscribe");
        assert_eq!(frame.topic.as_deref(), Some("risk_updates"));
    }

    #[tokio::test]
    async fn test_subscribe_marks_pending() {
        let (handle, mut rx, registry) = handle_with_state(ConnectionState::Connected);

        handle.subscribe("risk_updates").await.unwrap();

        assert!(registry.is_pending("risk_updates"));
        assert!(!registry.is_subscribed("risk_updates"));
        assert_eq!(rx.try_recv().unwrap().kind, "subscribe");
    }

    #[tokio::test]
    async fn test_subscribe_while_disconnected_leaves_registry_untouched() {
        let (handle, mut rx, registry) = handle_with_state(ConnectionState::Reconnecting);

        handle.subscribe("risk_updates").await.unwrap();

        assert!(!registry.is_pending("risk_updates"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_immediately() {
        let (handle, mut rx, registry) = handle_with_state(ConnectionState::Connected);
        registry.confirm("risk_updates");

        handle.unsubscribe("risk_updates").await.unwrap();

        // Removed before the server ever responds.
        assert!(!registry.is_subscribed("risk_updates"));
        assert_eq!(rx.try_recv().unwrap().kind, "unsubscribe");
    }

    #[tokio::test]
    async fn test_closed_channel_reports_disconnected() {
        let (handle, rx, _) = handle_with_state(ConnectionState::Connected);
        drop(rx);
        assert!(!handle.is_connected());
    }
}
