//! Wire frame types for the observatory stream.
//!
//! Every frame, in both directions, carries a `type` discriminator and a
//! timestamp. Inbound frames wrap their payload in a `data` field; the
//! three control types below are handled internally by the dispatcher,
//! everything else passes through to the message buffer unmodified.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frame type discriminators with dedicated handling.
pub mod frame_type {
    // Outbound (client -> server)
    pub const CONNECTION_REQUEST: &str = "connection_request";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";

    // Inbound control frames (server -> client)
    pub const CONNECTION_ESTABLISHED: &str = "connection_established";
    pub const SUBSCRIPTION_CONFIRMED: &str = "subscription_confirmed";
    pub const SYSTEM_STATS: &str = "system_stats";
}

/// Inbound frame envelope.
///
/// Immutable once received; the buffer stores these in strict receipt
/// order. `data` is kept as flexible JSON because domain payloads (risk
/// updates and friends) are opaque to this client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundFrame {
    /// Frame type discriminator.
    #[serde(rename = "type")]
    pub kind: String,
    /// Frame payload (flexible JSON).
    #[serde(default)]
    pub data: serde_json::Value,
    /// Server-side send timestamp.
    pub timestamp: String,
    /// Originating connection, when the server attributes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

impl InboundFrame {
    /// Whether this frame is a control frame consumed by the dispatcher
    /// rather than forwarded downstream.
    pub fn is_control(&self) -> bool {
        matches!(
            self.kind.as_str(),
            frame_type::CONNECTION_ESTABLISHED
                | frame_type::SUBSCRIPTION_CONFIRMED
                | frame_type::SYSTEM_STATS
        )
    }
}

/// `data` payload of a `connection_established` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionEstablished {
    /// Server-assigned connection identifier.
    pub connection_id: String,
    /// Server timestamp of the acknowledgement.
    pub timestamp: DateTime<Utc>,
}

/// `data` payload of a `subscription_confirmed` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfirmed {
    pub topic: String,
}

/// `data` payload of a `system_stats` frame.
///
/// Carries more fields on the wire; only the connection gauge matters here.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemStats {
    #[serde(default)]
    pub active_connections: u64,
}

/// Outgoing frame to the observatory server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Frame type discriminator.
    #[serde(rename = "type")]
    pub kind: String,
    /// Client-generated identifier, present on handshake frames only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Topic, present on subscribe/unsubscribe frames only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Client-side send timestamp.
    pub timestamp: DateTime<Utc>,
}

impl OutboundFrame {
    fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            client_id: None,
            topic: None,
            timestamp: Utc::now(),
        }
    }

    /// Create the handshake frame sent once per connection attempt.
    pub fn connection_request(client_id: String) -> Self {
        Self {
            client_id: Some(client_id),
            ..Self::new(frame_type::CONNECTION_REQUEST)
        }
    }

    /// Create a subscribe request for a topic.
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..Self::new(frame_type::SUBSCRIBE)
        }
    }

    /// Create an unsubscribe request for a topic.
    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..Self::new(frame_type::UNSUBSCRIBE)
        }
    }
}
