//! Topic subscription bookkeeping.
//!
//! The registry reconciles optimistic client state against server
//! acknowledgements. Subscribes are pending until the server confirms
//! them; unsubscribes take effect locally at once, without waiting for
//! an acknowledgement. The confirmed set therefore never contains a
//! topic the server has not acked.

use parking_lot::RwLock;
use std::collections::HashSet;

/// Tracks which topics the client believes it is subscribed to.
#[derive(Default)]
pub struct SubscriptionRegistry {
    /// Topics acknowledged by the server.
    confirmed: RwLock<HashSet<String>>,
    /// Topics requested but not yet acknowledged.
    pending: RwLock<HashSet<String>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a subscribe frame was sent for `topic`.
    pub fn mark_requested(&self, topic: &str) {
        self.pending.write().insert(topic.to_string());
    }

    /// Apply a server confirmation. Idempotent (set semantics).
    pub fn confirm(&self, topic: &str) {
        self.pending.write().remove(topic);
        self.confirmed.write().insert(topic.to_string());
    }

    /// Drop a topic locally, pending or confirmed.
    pub fn remove(&self, topic: &str) {
        self.pending.write().remove(topic);
        self.confirmed.write().remove(topic);
    }

    /// Forget all topics (called on every close).
    pub fn clear(&self) {
        self.pending.write().clear();
        self.confirmed.write().clear();
    }

    /// Whether the server has confirmed `topic`.
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.confirmed.read().contains(topic)
    }

    /// Whether `topic` is requested but not yet confirmed.
    pub fn is_pending(&self, topic: &str) -> bool {
        self.pending.read().contains(topic)
    }

    /// Confirmed topics, sorted for stable reads.
    pub fn confirmed(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.confirmed.read().iter().cloned().collect();
        topics.sort();
        topics
    }

    /// Pending topics, sorted for stable reads.
    pub fn pending(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.pending.read().iter().cloned().collect();
        topics.sort();
        topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_empty() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.confirmed().is_empty());
        assert!(registry.pending().is_empty());
        assert!(!registry.is_subscribed("risk_updates"));
    }

    #[test]
    fn test_request_does_not_confirm() {
        let registry = SubscriptionRegistry::new();
        registry.mark_requested("risk_updates");

        assert!(registry.is_pending("risk_updates"));
        assert!(!registry.is_subscribed("risk_updates"));
        assert!(registry.confirmed().is_empty());
    }

    #[test]
    fn test_confirmation_promotes_pending() {
        let registry = SubscriptionRegistry::new();
        registry.mark_requested("risk_updates");
        registry.confirm("risk_updates");

        assert!(registry.is_subscribed("risk_updates"));
        assert!(!registry.is_pending("risk_updates"));
        assert_eq!(registry.confirmed(), vec!["risk_updates".to_string()]);
    }

    #[test]
    fn test_confirmation_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        registry.confirm("risk_updates");
        registry.confirm("risk_updates");

        assert_eq!(registry.confirmed().len(), 1);
    }

    #[test]
    fn test_unsubscribe_removes_without_ack() {
        let registry = SubscriptionRegistry::new();
        registry.confirm("risk_updates");
        assert!(registry.is_subscribed("risk_updates"));

        // Local removal takes effect immediately; no server frame needed.
        registry.remove("risk_updates");
        assert!(!registry.is_subscribed("risk_updates"));
        assert!(!registry.is_pending("risk_updates"));
    }

    #[test]
    fn test_remove_drops_pending_request() {
        let registry = SubscriptionRegistry::new();
        registry.mark_requested("market_alerts");
        registry.remove("market_alerts");
        assert!(!registry.is_pending("market_alerts"));
    }

    #[test]
    fn test_clear_forgets_everything() {
        let registry = SubscriptionRegistry::new();
        registry.confirm("risk_updates");
        registry.mark_requested("market_alerts");

        registry.clear();
        assert!(registry.confirmed().is_empty());
        assert!(registry.pending().is_empty());
    }

    #[test]
    fn test_confirmed_topics_sorted() {
        let registry = SubscriptionRegistry::new();
        registry.confirm("market_alerts");
        registry.confirm("exposure_summary");
        registry.confirm("risk_updates");

        assert_eq!(
            registry.confirmed(),
            vec![
                "exposure_summary".to_string(),
                "market_alerts".to_string(),
                "risk_updates".to_string()
            ]
        );
    }
}
