//! Real-time streaming client for the riskobs observatory.
//!
//! Connects to the observatory WebSocket endpoint and maintains one
//! logical session:
//!
//! - automatic reconnection with exponential backoff after unexpected
//!   closes, and a clean stop on explicit disconnect
//! - acknowledged topic subscriptions, replayed on every new session
//! - a bounded sliding window of recent frames plus a lifetime counter
//! - typed routing of server control frames (`connection_established`,
//!   `subscription_confirmed`, `system_stats`)

use std::sync::Once;

pub mod buffer;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod message;
pub mod subscription;

pub use buffer::MessageBuffer;
pub use client::{ConnectionInfo, ConnectionState, StreamClient};
pub use config::StreamConfig;
pub use dispatcher::Dispatcher;
pub use error::{StreamError, StreamResult};
pub use handle::StreamHandle;
pub use message::{
    frame_type, ConnectionEstablished, InboundFrame, OutboundFrame, SubscriptionConfirmed,
    SystemStats,
};
pub use subscription::SubscriptionRegistry;

static INIT_CRYPTO: Once = Once::new();

/// Install the rustls crypto provider. Call once at startup, before the
/// first TLS connection; repeated calls are no-ops.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            tracing::debug!("Crypto provider already installed");
        }
    });
}
