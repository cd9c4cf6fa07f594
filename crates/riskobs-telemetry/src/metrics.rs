//! Prometheus metrics for the observatory stream client.
//!
//! Covers:
//! - Connection state and reconnect attempts
//! - Received frame counts by type
//! - Retained window size and server-reported connection totals
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_int_gauge, CounterVec,
    Gauge, GaugeVec, IntGauge,
};

/// Stream connection state (1 = connected, 0 = disconnected).
pub static STREAM_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "riskobs_stream_connected",
        "Stream connection state (1=connected)"
    )
    .unwrap()
});

/// Client lifecycle state.
/// Labels: state (disconnected/connecting/connected/reconnecting/error)
pub static STREAM_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "riskobs_stream_state",
        "Client lifecycle state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Total reconnection attempts.
pub static STREAM_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "riskobs_stream_reconnect_total",
        "Total stream reconnection attempts",
        &["reason"]
    )
    .unwrap()
});

/// Total frames received by frame type.
pub static FRAMES_RECEIVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "riskobs_frames_received_total",
        "Total inbound frames received by type",
        &["kind"]
    )
    .unwrap()
});

/// Total frames discarded because they failed to parse.
pub static FRAMES_DISCARDED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "riskobs_frames_discarded_total",
        "Total inbound frames discarded",
        &["reason"]
    )
    .unwrap()
});

/// Number of frames currently retained in the message window.
pub static BUFFERED_FRAMES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "riskobs_buffered_frames",
        "Frames currently retained in the message window"
    )
    .unwrap()
});

/// Server-wide connection count from the latest system_stats frame.
pub static ACTIVE_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "riskobs_active_connections",
        "Server-reported active connection count"
    )
    .unwrap()
});

/// Convenience facade over the metric statics.
pub struct Metrics;

impl Metrics {
    /// Record the stream as connected.
    pub fn stream_connected() {
        STREAM_CONNECTED.set(1.0);
    }

    /// Record the stream as disconnected.
    pub fn stream_disconnected() {
        STREAM_CONNECTED.set(0.0);
    }

    /// Set the lifecycle state gauge.
    /// Only the active state is set to 1, all others to 0.
    pub fn stream_state_set(state: &str) {
        for s in &[
            "disconnected",
            "connecting",
            "connected",
            "reconnecting",
            "error",
        ] {
            STREAM_STATE.with_label_values(&[s]).set(0.0);
        }
        STREAM_STATE.with_label_values(&[state]).set(1.0);
    }

    /// Record reconnection attempts observed since the last refresh.
    pub fn stream_reconnects(reason: &str, count: u64) {
        STREAM_RECONNECT_TOTAL
            .with_label_values(&[reason])
            .inc_by(count as f64);
    }

    /// Record a received frame.
    pub fn frame_received(kind: &str) {
        FRAMES_RECEIVED_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record discarded frames observed since the last refresh.
    pub fn frames_discarded(reason: &str, count: u64) {
        FRAMES_DISCARDED_TOTAL
            .with_label_values(&[reason])
            .inc_by(count as f64);
    }

    /// Update the retained-window gauge.
    pub fn buffered_frames(count: usize) {
        BUFFERED_FRAMES.set(count as i64);
    }

    /// Update the server-reported connection gauge.
    pub fn active_connections(count: u64) {
        ACTIVE_CONNECTIONS.set(count as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_gauge_is_exclusive() {
        Metrics::stream_state_set("connected");
        assert_eq!(STREAM_STATE.with_label_values(&["connected"]).get(), 1.0);
        assert_eq!(STREAM_STATE.with_label_values(&["reconnecting"]).get(), 0.0);

        Metrics::stream_state_set("reconnecting");
        assert_eq!(STREAM_STATE.with_label_values(&["connected"]).get(), 0.0);
        assert_eq!(STREAM_STATE.with_label_values(&["reconnecting"]).get(), 1.0);
    }

    #[test]
    fn test_reconnect_counter_accumulates_deltas() {
        let before = STREAM_RECONNECT_TOTAL
            .with_label_values(&["unexpected_close"])
            .get();
        Metrics::stream_reconnects("unexpected_close", 3);
        let after = STREAM_RECONNECT_TOTAL
            .with_label_values(&["unexpected_close"])
            .get();
        assert_eq!(after, before + 3.0);
    }

    #[test]
    fn test_frame_counter_increments() {
        let before = FRAMES_RECEIVED_TOTAL
            .with_label_values(&["risk_update"])
            .get();
        Metrics::frame_received("risk_update");
        let after = FRAMES_RECEIVED_TOTAL
            .with_label_values(&["risk_update"])
            .get();
        assert_eq!(after, before + 1.0);
    }
}
