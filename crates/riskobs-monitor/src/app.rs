//! Main application orchestration.
//!
//! Owns the stream client, forwards received frames into logs and
//! metrics, and shuts the session down cleanly on Ctrl-C.

use crate::config::AppConfig;
use crate::error::AppResult;
use riskobs_stream::{ConnectionState, InboundFrame, StreamClient};
use riskobs_telemetry::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Capacity of the inbound event channel.
const EVENT_CHANNEL_SIZE: usize = 256;

/// Interval for refreshing connection gauges.
const GAUGE_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Main application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Run until Ctrl-C.
    pub async fn run(&self) -> AppResult<()> {
        let (event_tx, mut event_rx) = mpsc::channel::<InboundFrame>(EVENT_CHANNEL_SIZE);
        let client = Arc::new(StreamClient::new(self.config.stream_config(), event_tx));

        let runner = client.clone();
        let session = tokio::spawn(async move { runner.connect().await });

        let gauge_client = client.clone();
        let gauges = tokio::spawn(async move {
            let mut tick = tokio::time::interval(GAUGE_REFRESH_INTERVAL);
            let mut seen_reconnects = 0u64;
            let mut seen_discarded = 0u64;
            loop {
                tick.tick().await;
                let state = gauge_client.state();
                Metrics::stream_state_set(&state.to_string());
                if state == ConnectionState::Connected {
                    Metrics::stream_connected();
                } else {
                    Metrics::stream_disconnected();
                }
                Metrics::buffered_frames(gauge_client.messages().len());
                Metrics::active_connections(gauge_client.active_connections());

                // The client keeps lifetime counts; export the deltas.
                let reconnects = gauge_client.reconnect_attempts();
                if reconnects > seen_reconnects {
                    Metrics::stream_reconnects("unexpected_close", reconnects - seen_reconnects);
                    seen_reconnects = reconnects;
                }
                let discarded = gauge_client.discarded_frames();
                if discarded > seen_discarded {
                    Metrics::frames_discarded("parse_error", discarded - seen_discarded);
                    seen_discarded = discarded;
                }
            }
        });

        info!("Monitor running, press Ctrl-C to stop");

        loop {
            tokio::select! {
                frame = event_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            Metrics::frame_received(&frame.kind);
                            info!(
                                kind = %frame.kind,
                                timestamp = %frame.timestamp,
                                total = client.message_count(),
                                "Frame received"
                            );
                        }
                        None => {
                            warn!("Event channel closed");
                            break;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    client.disconnect().await;
                    break;
                }
            }
        }

        gauges.abort();

        match session.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Session ended with error"),
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!(error = %e, "Session task panicked"),
        }

        info!(
            received = client.message_count(),
            retained = client.messages().len(),
            "Monitor stopped"
        );
        Ok(())
    }
}
