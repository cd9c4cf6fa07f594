//! Stream client configuration.

use serde::{Deserialize, Serialize};

/// Default observatory endpoint, used when no deployment override is given.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8000/ws";

/// Connection configuration.
///
/// Buffer capacity and the reconnect policy are exposed as fields so
/// deployments can tune them; the defaults reproduce the stock behavior
/// (50-message window, first retry after 5 s).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// WebSocket endpoint URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Topics requested after every successful handshake.
    ///
    /// Subscriptions never survive a disconnect, so these are re-requested
    /// on each (re)connect. Topics subscribed manually at runtime are not
    /// restored.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Sliding-window capacity of the message buffer.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Maximum reconnection attempts (0 = infinite).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff; the first retry fires after this.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Ceiling for exponential backoff.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
}

fn default_url() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_buffer_capacity() -> usize {
    50
}

fn default_reconnect_base_delay_ms() -> u64 {
    5000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            topics: Vec::new(),
            buffer_capacity: default_buffer_capacity(),
            max_reconnect_attempts: 0, // Infinite
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
        }
    }
}
