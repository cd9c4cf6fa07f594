//! Session lifecycle tests against an in-process mock server.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use riskobs_stream::{ConnectionState, InboundFrame, StreamClient, StreamConfig, StreamError};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Minimal observatory server: acks the handshake, confirms subscribes,
/// and optionally drops the TCP connection right after the handshake ack
/// to exercise the reconnect path.
struct MockStreamServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<serde_json::Value>>>,
    shutdown: CancellationToken,
}

impl MockStreamServer {
    async fn start(drop_after_ack: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));
        let shutdown = CancellationToken::new();

        let conn_count = connections.clone();
        let recv_log = received.clone();
        let token = shutdown.clone();

        tokio::spawn(async move {
            loop {
                let stream = tokio::select! {
                    _ = token.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => stream,
                        Err(_) => break,
                    },
                };
                conn_count.fetch_add(1, Ordering::SeqCst);

                let recv_log = recv_log.clone();
                tokio::spawn(async move {
                    let ws = match accept_async(stream).await {
                        Ok(ws) => ws,
                        Err(_) => return,
                    };
                    let (mut write, mut read) = ws.split();

                    while let Some(Ok(msg)) = read.next().await {
                        let Message::Text(text) = msg else { continue };
                        let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
                            continue;
                        };
                        recv_log.lock().push(value.clone());

                        match value["type"].as_str() {
                            Some("connection_request") => {
                                let ack = serde_json::json!({
                                    "type": "connection_established",
                                    "data": {
                                        "connection_id": "conn-abc123",
                                        "timestamp": "2026-02-11T09:30:00Z"
                                    },
                                    "timestamp": "2026-02-11T09:30:00Z"
                                });
                                if write.send(Message::Text(ack.to_string())).await.is_err() {
                                    return;
                                }
                                if drop_after_ack {
                                    // Drop TCP without a Close frame.
                                    return;
                                }
                            }
                            Some("subscribe") => {
                                let ack = serde_json::json!({
                                    "type": "subscription_confirmed",
                                    "data": { "topic": value["topic"] },
                                    "timestamp": "2026-02-11T09:30:00Z"
                                });
                                if write.send(Message::Text(ack.to_string())).await.is_err() {
                                    return;
                                }
                            }
                            _ => {}
                        }
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            received,
            shutdown,
        }
    }

    fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn received_of_type(&self, kind: &str) -> Vec<serde_json::Value> {
        self.received
            .lock()
            .iter()
            .filter(|v| v["type"] == kind)
            .cloned()
            .collect()
    }
}

impl Drop for MockStreamServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn test_config(url: String, topics: Vec<String>) -> StreamConfig {
    StreamConfig {
        url,
        topics,
        reconnect_base_delay_ms: 100,
        reconnect_max_delay_ms: 500,
        ..StreamConfig::default()
    }
}

fn spawn_client(config: StreamConfig) -> (Arc<StreamClient>, mpsc::Receiver<InboundFrame>) {
    let (tx, rx) = mpsc::channel(64);
    let client = Arc::new(StreamClient::new(config, tx));
    let runner = client.clone();
    tokio::spawn(async move {
        let _ = runner.connect().await;
    });
    (client, rx)
}

/// Poll until `check` passes or two seconds elapse.
async fn wait_for(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .expect("condition not reached within timeout");
}

#[tokio::test]
async fn test_connect_populates_connection_info() {
    let server = MockStreamServer::start(false).await;
    let (client, _rx) = spawn_client(test_config(server.url(), vec![]));

    wait_for(|| client.connection_info().is_some()).await;

    assert_eq!(client.state(), ConnectionState::Connected);
    let info = client.connection_info().unwrap();
    assert_eq!(info.connection_id, "conn-abc123");
    assert!(info.subscriptions.is_empty());
}

#[tokio::test]
async fn test_configured_topics_subscribed_and_confirmed() {
    let server = MockStreamServer::start(false).await;
    let config = test_config(server.url(), vec!["risk_updates".to_string()]);
    let (client, _rx) = spawn_client(config);

    wait_for(|| client.subscriptions() == vec!["risk_updates".to_string()]).await;

    assert!(client.pending_subscriptions().is_empty());
    let subs = server.received_of_type("subscribe");
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0]["topic"], "risk_updates");

    let info = client.connection_info().unwrap();
    assert_eq!(info.subscriptions, vec!["risk_updates".to_string()]);
}

#[tokio::test]
async fn test_subscribe_waits_for_ack_unsubscribe_does_not() {
    let server = MockStreamServer::start(false).await;
    let (client, _rx) = spawn_client(test_config(server.url(), vec![]));
    wait_for(|| client.state() == ConnectionState::Connected).await;

    client.subscribe("market_alerts").await.unwrap();
    wait_for(|| client.subscriptions() == vec!["market_alerts".to_string()]).await;

    client.unsubscribe("market_alerts").await.unwrap();
    // Removed locally before any server response could arrive.
    assert!(client.subscriptions().is_empty());

    wait_for(|| !server.received_of_type("unsubscribe").is_empty()).await;
}

#[tokio::test]
async fn test_disconnect_clears_state_and_stops_retrying() {
    let server = MockStreamServer::start(false).await;
    let config = test_config(server.url(), vec!["risk_updates".to_string()]);
    let (client, _rx) = spawn_client(config);
    wait_for(|| !client.subscriptions().is_empty()).await;

    client.disconnect().await;

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(client.connection_info().is_none());
    assert!(client.subscriptions().is_empty());

    // Well past the 100ms backoff; no new dial may happen.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(server.connection_count(), 1);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_reconnects_after_unexpected_close() {
    let server = MockStreamServer::start(true).await;
    let (client, _rx) = spawn_client(test_config(server.url(), vec![]));

    wait_for(|| server.connection_count() >= 2).await;

    // Each session performed its own handshake, and every retry was
    // tallied.
    wait_for(|| server.received_of_type("connection_request").len() >= 2).await;
    assert!(client.reconnect_attempts() >= 1);
    client.disconnect().await;
}

#[tokio::test]
async fn test_gives_up_after_max_reconnect_attempts() {
    let server = MockStreamServer::start(true).await;
    let mut config = test_config(server.url(), vec![]);
    config.max_reconnect_attempts = 1;

    let (tx, _rx) = mpsc::channel(16);
    let client = StreamClient::new(config, tx);

    let result = tokio::time::timeout(Duration::from_secs(2), client.connect())
        .await
        .expect("connect did not give up in time");

    assert!(matches!(result, Err(StreamError::ConnectionFailed(_))));
    assert_eq!(client.state(), ConnectionState::Error);
    assert_eq!(server.connection_count(), 1);
}
