//! Exchange configuration.

use serde::Deserialize;
use std::time::Duration;

use super::duration;
use crate::domain::Credentials;

/// Default HTTP request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between client pings on the ticker stream.
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Default delay before reconnecting the ticker stream.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Binance account settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExchangeConfig {
    /// API key. `BINANCE_API_KEY` overrides the file value.
    #[serde(default)]
    pub api_key: String,
    /// API secret. `BINANCE_API_SECRET` overrides the file value.
    #[serde(default)]
    pub api_secret: String,
    /// REST base URL override.
    pub base_url: Option<String>,
    /// Ticker stream URL override.
    pub stream_url: Option<String>,
    /// Timeout applied to every REST request.
    #[serde(default = "default_request_timeout", with = "duration")]
    pub request_timeout: Duration,
    /// `recvWindow` sent with signed requests, in milliseconds.
    pub receive_window: Option<u64>,
    /// Ticker stream settings.
    #[serde(default)]
    pub websocket: WebSocketConfig,
}

impl ExchangeConfig {
    /// Returns the configured key pair.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.api_key.clone(), self.api_secret.clone())
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            base_url: None,
            stream_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            receive_window: None,
            websocket: WebSocketConfig::default(),
        }
    }
}

/// WebSocket connection settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebSocketConfig {
    /// Interval between ping messages to keep connection alive.
    #[serde(default = "default_ping_interval", with = "duration")]
    pub ping_interval: Duration,
    /// Delay before attempting to reconnect after disconnection.
    #[serde(default = "default_reconnect_delay", with = "duration")]
    pub reconnect_delay: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_ping_interval() -> Duration {
    DEFAULT_PING_INTERVAL
}

fn default_reconnect_delay() -> Duration {
    DEFAULT_RECONNECT_DELAY
}
