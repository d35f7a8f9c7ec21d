use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::config::ExchangeConfig;
use crate::pricing::PriceCache;

/// Binance combined stream endpoint.
const STREAM_BASE_URL: &str = "wss://stream.binance.com:9443/stream";

/// Pairs kept live in the price cache.
pub const TRACKED_SYMBOLS: [&str; 8] = [
    "BTCUSDT", "ETHUSDT", "BNBUSDT", "ADAUSDT", "XRPUSDT", "SOLUSDT", "DOTUSDT", "LINKUSDT",
];

/// Callback invoked after every tick has been written to the cache.
pub type OnTick = Arc<dyn Fn() + Send + Sync>;

/// Text frames of one connection. The stream ends when the server closes.
pub type TickStream = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

/// Ticker stream transport errors. Never leave the feed.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Connection state of the price feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the reconnect delay.
    Reconnecting,
}

/// Opens one ticker stream connection.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<TickStream, StreamError>;
}

/// WebSocket connector that keeps the connection alive with pings.
pub struct WsConnector {
    ping_interval: Duration,
}

impl WsConnector {
    /// `ping_interval` must be non-zero; config validation guarantees it.
    pub fn new(ping_interval: Duration) -> Self {
        Self { ping_interval }
    }
}

#[async_trait]
impl StreamConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<TickStream, StreamError> {
        info!(url = %url, "connecting to websocket");

        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        info!("websocket connected");

        let period = self.ping_interval;
        let ping = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        let frames = stream::unfold((ws_stream, ping), |(mut ws, mut ping)| async move {
            loop {
                tokio::select! {
                    msg = ws.next() => {
                        match msg {
                            Some(Ok(WsMessage::Text(text))) => {
                                return Some((Ok(text.as_str().to_owned()), (ws, ping)));
                            }
                            Some(Ok(WsMessage::Close(frame))) => {
                                info!(frame = ?frame, "websocket closed by server");
                                return None;
                            }
                            Some(Ok(_)) => {
                                // Ping, Pong, Binary
                            }
                            Some(Err(e)) => {
                                return Some((Err(StreamError::Transport(e.to_string())), (ws, ping)));
                            }
                            None => return None,
                        }
                    }
                    _ = ping.tick() => {
                        if let Err(e) = ws.send(WsMessage::Ping(Default::default())).await {
                            return Some((Err(StreamError::Transport(e.to_string())), (ws, ping)));
                        }
                        debug!("ping sent");
                    }
                }
            }
        });

        Ok(Box::pin(frames))
    }
}

/// Endpoint and timing of the price feed.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub url: String,
    pub reconnect_delay: Duration,
}

impl FeedSettings {
    pub fn from_config(config: &ExchangeConfig) -> Self {
        let base = config.stream_url.as_deref().unwrap_or(STREAM_BASE_URL);
        let ws = &config.websocket;

        Self {
            url: stream_url(base, &TRACKED_SYMBOLS),
            reconnect_delay: ws.reconnect_delay,
        }
    }
}

/// Builds a combined stream URL subscribing to the 24h ticker of `symbols`.
fn stream_url(base: &str, symbols: &[&str]) -> String {
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}@ticker", s.to_lowercase()))
        .collect();
    format!("{}?streams={}", base, streams.join("/"))
}

/// Keeps the tracked pairs' prices current in the cache.
///
/// Runs until closed: every lost or refused connection is retried after
/// the reconnect delay, forever.
pub struct PriceFeed {
    settings: FeedSettings,
    cache: Arc<PriceCache>,
    connector: Arc<dyn StreamConnector>,
    on_tick: OnTick,
    state: Mutex<FeedState>,
    shutdown: watch::Sender<bool>,
}

impl PriceFeed {
    pub fn new(
        settings: FeedSettings,
        cache: Arc<PriceCache>,
        connector: Arc<dyn StreamConnector>,
        on_tick: OnTick,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            settings,
            cache,
            connector,
            on_tick,
            state: Mutex::new(FeedState::Disconnected),
            shutdown,
        }
    }

    /// Current connection state.
    #[cfg(test)]
    pub(crate) fn state(&self) -> FeedState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: FeedState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Returns true once `close` has been called.
    #[cfg(test)]
    fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Runs the feed as a background task.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let feed = Arc::clone(self);
        tokio::spawn(async move { feed.run().await })
    }

    /// Connect, read, reconnect loop. Returns after `close`.
    pub async fn run(&self) {
        let mut shutdown = self.shutdown.subscribe();

        while !*shutdown.borrow() {
            self.set_state(FeedState::Connecting);

            let connected = tokio::select! {
                result = self.connector.connect(&self.settings.url) => result,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok(stream) => {
                    self.set_state(FeedState::Connected);
                    info!(symbols = ?TRACKED_SYMBOLS, "subscribed to ticker stream");
                    if self.read_loop(stream, &mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "ticker stream unavailable");
                }
            }

            self.set_state(FeedState::Reconnecting);
            info!(delay = ?self.settings.reconnect_delay, "reconnecting");

            tokio::select! {
                _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.set_state(FeedState::Disconnected);
        info!("price feed stopped");
    }

    /// Reads frames until the stream fails or ends.
    /// Returns true if it stopped because of shutdown.
    async fn read_loop(&self, mut stream: TickStream, shutdown: &mut watch::Receiver<bool>) -> bool {
        loop {
            tokio::select! {
                _ = shutdown.changed() => return true,
                msg = stream.next() => {
                    match msg {
                        Some(Ok(text)) => self.handle_message(&text),
                        Some(Err(e)) => {
                            error!(error = %e, "ticker stream error");
                            return false;
                        }
                        None => {
                            info!("ticker stream ended");
                            return false;
                        }
                    }
                }
            }
        }
    }

    fn handle_message(&self, text: &str) {
        match parse_ticker(text) {
            Ok(tick) => {
                debug!(symbol = %tick.symbol, price = %tick.price, "tick");
                self.cache.put(&tick.symbol, tick.price);
                (self.on_tick)();
            }
            Err(reason) => {
                warn!(reason = %reason, "dropping ticker message");
            }
        }
    }

    /// Stops the feed: closes the connection and cancels a pending reconnect.
    pub fn close(&self) {
        if self.shutdown.send_replace(true) {
            return;
        }
        info!("closing price feed");
    }
}

/// A single price observation from the stream.
#[derive(Debug, Clone, PartialEq)]
struct Tick {
    symbol: String,
    price: Decimal,
}

/// Combined stream envelope.
/// Format: {"stream":"btcusdt@ticker","data":{"e":"24hrTicker","s":"BTCUSDT","c":"60000.00",...}}
#[derive(Debug, Deserialize)]
struct CombinedMessage {
    stream: Option<String>,
    data: Option<TickerData>,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "c")]
    last_price: String,
}

fn parse_ticker(text: &str) -> Result<Tick, String> {
    let msg: CombinedMessage =
        serde_json::from_str(text).map_err(|e| format!("invalid json: {}", e))?;

    let data = msg
        .data
        .ok_or_else(|| format!("no ticker data (stream {:?})", msg.stream))?;

    let price = Decimal::from_str(data.last_price.trim())
        .map_err(|e| format!("invalid price {:?}: {}", data.last_price, e))?;
    if price.is_zero() || price.is_sign_negative() {
        return Err(format!("non-positive price {} for {}", price, data.symbol));
    }

    Ok(Tick {
        symbol: data.symbol.to_uppercase(),
        price,
    })
}
