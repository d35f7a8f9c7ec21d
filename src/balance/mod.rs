//! Balance aggregation across spot, cross margin and isolated margin.
//!
//! `BalanceService` combines the three account fetchers with the price
//! cache into one USDT estimate, caches the result for a short freshness
//! window and drives background recomputation from the price feed.
//!
//! There are two entry points with different error contracts:
//! - `compute_total` is awaited by the caller and returns every mandatory
//!   path failure (credentials, spot account).
//! - `request_silent_refresh` is fire-and-forget: it is throttled, only
//!   runs after the first successful computation, and delivers results
//!   through the update notifier while failures are only logged.

mod fetchers;
#[cfg(test)]
pub(crate) mod mock;

pub use fetchers::{fetch_cross_margin, fetch_isolated_margin, fetch_spot};

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use futures_util::future::join_all;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{BalanceSnapshot, Credentials, SETTLEMENT_ASSET, usdt_symbol};
use crate::exchanges::binance::{FeedSettings, PriceFeed, StreamConnector};
use crate::exchanges::{AccountApi, ExchangeError, Result};
use crate::notification::UpdateNotifier;
use crate::pricing::PriceCache;

/// A cached snapshot younger than this is served without network access.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(30);

/// Default minimum gap between background recomputations.
const DEFAULT_SILENT_INTERVAL: Duration = Duration::from_secs(5);

struct Freshness {
    snapshot: Option<BalanceSnapshot>,
    /// Instant of the last successful aggregation. Cleared on configuration change.
    last_update: Option<Instant>,
    /// Instant the throttle gate last let a background recomputation through.
    last_silent_trigger: Option<Instant>,
    initialized: bool,
    silent_interval: Duration,
}

struct RunningFeed {
    feed: Arc<PriceFeed>,
    task: JoinHandle<()>,
}

/// Aggregates account holdings into a USDT total.
pub struct BalanceService {
    api: Arc<dyn AccountApi>,
    prices: Arc<PriceCache>,
    state: Mutex<Freshness>,
    notifier: UpdateNotifier,
    feed: Mutex<Option<RunningFeed>>,
}

impl BalanceService {
    pub fn new(api: Arc<dyn AccountApi>, prices: Arc<PriceCache>, silent_interval: Duration) -> Self {
        Self {
            api,
            prices,
            state: Mutex::new(Freshness {
                snapshot: None,
                last_update: None,
                last_silent_trigger: None,
                initialized: false,
                silent_interval: if silent_interval.is_zero() {
                    DEFAULT_SILENT_INTERVAL
                } else {
                    silent_interval
                },
            }),
            notifier: UpdateNotifier::new(),
            feed: Mutex::new(None),
        }
    }

    /// The price cache shared with the feed.
    #[cfg(test)]
    pub(crate) fn prices(&self) -> &Arc<PriceCache> {
        &self.prices
    }

    /// Returns true if API credentials are present.
    pub fn is_configured(&self) -> bool {
        self.api.is_configured()
    }

    /// Returns true after the first successful computation.
    pub fn is_initialized(&self) -> bool {
        self.lock_state().initialized
    }

    /// The most recent snapshot, however old.
    pub fn snapshot(&self) -> Option<BalanceSnapshot> {
        self.lock_state().snapshot.clone()
    }

    /// Resolves a price through the cache.
    pub async fn get_price(&self, symbol: &str, prefer_cache: bool) -> Result<Decimal> {
        self.prices.get(symbol, prefer_cache).await
    }

    /// Computes the total account value in USDT.
    ///
    /// With `prefer_cache` a snapshot younger than `FRESHNESS_WINDOW` is
    /// returned without any request, and cached prices are used where
    /// present. Without it every holding is fetched and priced fresh.
    pub async fn compute_total(&self, prefer_cache: bool) -> Result<BalanceSnapshot> {
        if !self.api.is_configured() {
            return Err(ExchangeError::NotConfigured);
        }

        if prefer_cache {
            if let Some(snapshot) = self.fresh_snapshot() {
                debug!("serving cached balance snapshot");
                return Ok(snapshot);
            }
        }

        let api = self.api.as_ref();
        let (spot, margin, isolated) = tokio::join!(
            fetch_spot(api),
            fetch_cross_margin(api),
            fetch_isolated_margin(api)
        );
        let spot = spot?;

        let spot_usdt = self
            .sum_values(spot.iter().map(|b| (b.asset.as_str(), b.total())), prefer_cache)
            .await;

        let margin_usdt = self
            .sum_values(
                margin.iter().map(|a| (a.asset.as_str(), a.net_asset)),
                prefer_cache,
            )
            .await;

        // Each isolated pair carries two independent exposures.
        let isolated_usdt = self
            .sum_values(
                isolated.iter().flat_map(|p| {
                    [
                        (p.base.asset.as_str(), p.base.net_asset),
                        (p.quote.asset.as_str(), p.quote.net_asset),
                    ]
                }),
                prefer_cache,
            )
            .await;

        let snapshot = BalanceSnapshot::new(spot_usdt, margin_usdt, isolated_usdt);
        self.record(&snapshot);

        info!(
            total = %snapshot.total_usdt,
            spot = %snapshot.spot_usdt,
            margin = %snapshot.margin_usdt,
            isolated = %snapshot.isolated_margin_usdt,
            prefer_cache = prefer_cache,
            "balance computed"
        );

        Ok(snapshot)
    }

    /// Values `(asset, amount)` holdings in USDT, pricing them concurrently.
    async fn sum_values<'a, I>(&self, holdings: I, prefer_cache: bool) -> Decimal
    where
        I: IntoIterator<Item = (&'a str, Decimal)>,
    {
        let values = join_all(
            holdings
                .into_iter()
                .map(|(asset, amount)| self.value_in_usdt(asset, amount, prefer_cache)),
        )
        .await;
        values.into_iter().fold(Decimal::ZERO, |total, value| {
            total.checked_add(value).unwrap_or_else(|| {
                warn!(total = %total, value = %value, "skipping holding that overflows the total");
                total
            })
        })
    }

    /// Converts one holding to USDT. A missing price counts the holding as zero.
    async fn value_in_usdt(&self, asset: &str, amount: Decimal, prefer_cache: bool) -> Decimal {
        if amount.is_zero() {
            return Decimal::ZERO;
        }
        if asset.eq_ignore_ascii_case(SETTLEMENT_ASSET) {
            return amount;
        }

        match self.prices.get(&usdt_symbol(asset), prefer_cache).await {
            Ok(price) => amount.checked_mul(price).unwrap_or_else(|| {
                warn!(asset = %asset, amount = %amount, price = %price, "skipping holding with overflowing value");
                Decimal::ZERO
            }),
            Err(e) => {
                warn!(asset = %asset, amount = %amount, error = %e, "skipping unpriced asset");
                Decimal::ZERO
            }
        }
    }

    fn fresh_snapshot(&self) -> Option<BalanceSnapshot> {
        let state = self.lock_state();
        match (&state.snapshot, state.last_update) {
            (Some(snapshot), Some(at)) if at.elapsed() < FRESHNESS_WINDOW => Some(snapshot.clone()),
            _ => None,
        }
    }

    fn record(&self, snapshot: &BalanceSnapshot) {
        let mut state = self.lock_state();
        state.snapshot = Some(snapshot.clone());
        state.last_update = Some(Instant::now());
        state.initialized = true;
    }

    /// Starts a background recomputation if the throttle allows it.
    ///
    /// Returns true if one was started. The result goes to the update
    /// subscriber; errors are logged and never reach a caller.
    pub fn request_silent_refresh(self: &Arc<Self>) -> bool {
        if !self.try_open_silent_gate() {
            return false;
        }

        let service = Arc::clone(self);
        tokio::spawn(async move {
            match service.compute_total(true).await {
                Ok(snapshot) => {
                    if !service.notifier.notify(&snapshot) {
                        debug!("background balance computed without a subscriber");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "background balance refresh failed");
                }
            }
        });
        true
    }

    /// Lets a background recomputation through when initialized and both the
    /// last aggregation and the last background trigger are older than the
    /// silent interval.
    fn try_open_silent_gate(&self) -> bool {
        let mut state = self.lock_state();
        if !state.initialized {
            return false;
        }

        let now = Instant::now();
        let interval = state.silent_interval;
        let elapsed = |at: Option<Instant>| at.is_none_or(|at| now.duration_since(at) > interval);

        if !elapsed(state.last_update) || !elapsed(state.last_silent_trigger) {
            return false;
        }

        state.last_silent_trigger = Some(now);
        true
    }

    /// Applies changed settings.
    ///
    /// Replaces the credentials and clears the last update time, so the next
    /// computation, manual or silent, skips the freshness short-circuit.
    pub fn refresh_configuration(&self, credentials: Credentials, silent_interval: Duration) {
        let configured = credentials.is_configured();
        self.api.set_credentials(credentials);

        let mut state = self.lock_state();
        state.last_update = None;
        if !silent_interval.is_zero() {
            state.silent_interval = silent_interval;
        }

        info!(
            configured = configured,
            silent_interval = ?state.silent_interval,
            "configuration refreshed"
        );
    }

    /// Registers the single receiver of background updates.
    pub fn subscribe_to_updates<F>(&self, callback: F)
    where
        F: Fn(&BalanceSnapshot) + Send + Sync + 'static,
    {
        if self.notifier.subscribe(callback) {
            debug!("replaced balance update subscriber");
        }
    }

    /// Starts streaming prices into the cache. Every tick requests a
    /// throttled background recomputation. Replaces a running feed.
    pub fn start_price_feed(
        self: &Arc<Self>,
        settings: FeedSettings,
        connector: Arc<dyn StreamConnector>,
    ) -> Arc<PriceFeed> {
        let service: Weak<Self> = Arc::downgrade(self);
        let on_tick = Arc::new(move || {
            if let Some(service) = service.upgrade() {
                service.request_silent_refresh();
            }
        });

        let feed = Arc::new(PriceFeed::new(
            settings,
            Arc::clone(&self.prices),
            connector,
            on_tick,
        ));
        let task = feed.spawn();

        let previous = self
            .feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(RunningFeed {
                feed: Arc::clone(&feed),
                task,
            });
        if let Some(previous) = previous {
            previous.feed.close();
        }

        feed
    }

    /// State of the price feed, if one was started.
    #[cfg(test)]
    pub(crate) fn feed_state(&self) -> Option<crate::exchanges::binance::FeedState> {
        self.feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|running| running.feed.state())
    }

    /// Closes the price feed, cancels its pending reconnect and drops the
    /// update subscriber.
    ///
    /// Returns the feed task, if a feed was running, so the caller can wait
    /// for it to stop.
    pub fn dispose(&self) -> Option<JoinHandle<()>> {
        self.notifier.unsubscribe();
        let running = self
            .feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        running.feed.close();
        Some(running.task)
    }

    /// Disposes the service and waits for the feed task to finish.
    pub async fn shutdown(&self) {
        if let Some(task) = self.dispose() {
            if let Err(e) = task.await {
                warn!(error = %e, "price feed task failed");
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Freshness> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
