// crates/client/src/config.rs
//! Client configuration.

use std::time::Duration;

/// Top-level configuration for all client components.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP API base, e.g. `http://localhost:8000`. No trailing slash.
    pub api_base: String,
    /// WebSocket base, e.g. `ws://localhost:8000`. No trailing slash.
    pub ws_base: String,
    pub stream: StreamConfig,
}

/// Tuning for the progress-stream client.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Backoff unit: failure *n* sleeps `base_delay * n` before reconnecting.
    pub base_delay: Duration,
    /// Consecutive failures tolerated before giving up. Failure
    /// `max_attempts + 1` is terminal.
    pub max_attempts: u32,
    /// Interval between transport-level pings while the channel is open.
    pub heartbeat_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_attempts: 5,
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: std::env::var("AXIOMFLOW_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
            ws_base: std::env::var("AXIOMFLOW_WS_URL")
                .unwrap_or_else(|_| "ws://127.0.0.1:8000".to_string()),
            stream: StreamConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Config pointed at explicit bases, with default stream tuning.
    pub fn with_bases(api_base: impl Into<String>, ws_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ws_base: ws_base.into(),
            stream: StreamConfig::default(),
        }
    }
}
