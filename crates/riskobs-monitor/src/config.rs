//! Application configuration.

use crate::error::{AppError, AppResult};
use riskobs_stream::StreamConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Observatory WebSocket endpoint.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Topics subscribed on every session.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
    #[serde(default)]
    pub stream: WsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Stream tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// Retained message window size.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Reconnect attempts before giving up. 0 = retry forever.
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// First reconnect delay (ms); doubles per attempt.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Reconnect delay ceiling (ms).
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Default tracing filter when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_ws_url() -> String {
    riskobs_stream::config::DEFAULT_ENDPOINT.to_string()
}

fn default_topics() -> Vec<String> {
    vec![
        "risk_updates".to_string(),
        "exposure_summary".to_string(),
        "market_alerts".to_string(),
    ]
}

fn default_buffer_capacity() -> usize {
    50
}

fn default_reconnect_base_delay_ms() -> u64 {
    5_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

fn default_log_level() -> String {
    "info,riskobs=debug".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            topics: default_topics(),
            stream: WsConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            max_reconnect_attempts: 0,
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var("RISKOBS_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Build the stream client configuration, honoring the
    /// `RISKOBS_WS_URL` environment override.
    pub fn stream_config(&self) -> StreamConfig {
        let url = std::env::var("RISKOBS_WS_URL").unwrap_or_else(|_| self.ws_url.clone());

        StreamConfig {
            url,
            topics: self.topics.clone(),
            buffer_capacity: self.stream.buffer_capacity,
            max_reconnect_attempts: self.stream.max_reconnect_attempts,
            reconnect_base_delay_ms: self.stream.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.stream.reconnect_max_delay_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.ws_url, "ws://127.0.0.1:8000/ws");
        assert_eq!(config.topics.len(), 3);
        assert_eq!(config.stream.buffer_capacity, 50);
        assert_eq!(config.stream.max_reconnect_attempts, 0);
        assert_eq!(config.stream.reconnect_base_delay_ms, 5_000);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
            ws_url = "wss://observatory.internal/ws"
            topics = ["risk_updates"]

            [stream]
            max_reconnect_attempts = 5
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.ws_url, "wss://observatory.internal/ws");
        assert_eq!(config.topics, vec!["risk_updates".to_string()]);
        assert_eq!(config.stream.max_reconnect_attempts, 5);
        // Unspecified fields fall back to defaults.
        assert_eq!(config.stream.reconnect_max_delay_ms, 60_000);
        assert_eq!(config.telemetry.log_level, "info,riskobs=debug");
    }

    #[test]
    fn test_stream_config_mapping() {
        let mut config = AppConfig::default();
        config.stream.buffer_capacity = 100;

        let stream = config.stream_config();
        assert_eq!(stream.buffer_capacity, 100);
        assert_eq!(stream.topics, config.topics);
    }
}
