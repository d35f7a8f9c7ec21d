//! Status line controller.
//!
//! Renders balance snapshots into the display sink, runs the periodic
//! refresh timer and guards manual refreshes against overlap.

mod error;
mod sink;

pub use error::StatusError;
pub use sink::{DisplaySink, StatusItem, StatusKind, StdoutSink};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::balance::BalanceService;
use crate::config::DisplayConfig;
use crate::domain::{BalanceSnapshot, DisplayCurrency};
use crate::exchanges::ExchangeError;
use crate::notification::{
    format_error, format_loading, format_not_configured, format_status_text, format_tooltip,
};

/// Clears the in-progress flag when the refresh ends, however it ends.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives the status line from a `BalanceService`.
pub struct StatusBar {
    service: Arc<BalanceService>,
    sink: Arc<dyn DisplaySink>,
    display: RwLock<DisplayConfig>,
    refreshing: AtomicBool,
}

impl StatusBar {
    pub fn new(
        service: Arc<BalanceService>,
        sink: Arc<dyn DisplaySink>,
        display: DisplayConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            service,
            sink,
            display: RwLock::new(display),
            refreshing: AtomicBool::new(false),
        })
    }

    /// Subscribes to background updates. Each one is rendered with cached
    /// conversion prices.
    pub fn attach(self: &Arc<Self>) {
        let bar = Arc::downgrade(self);
        self.service.subscribe_to_updates(move |snapshot| {
            let Some(bar) = bar.upgrade() else {
                return;
            };
            let snapshot = snapshot.clone();
            tokio::spawn(async move {
                bar.render(&snapshot, true).await;
            });
        });
    }

    /// Current display settings.
    pub fn display(&self) -> DisplayConfig {
        self.display
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the display settings. Takes effect on the next render.
    pub fn update_display(&self, display: DisplayConfig) {
        *self
            .display
            .write()
            .unwrap_or_else(PoisonError::into_inner) = display;
    }

    /// Re-renders the last snapshot, if any, with cached prices.
    pub async fn redraw(&self) {
        if let Some(snapshot) = self.service.snapshot() {
            self.render(&snapshot, true).await;
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Shows the loading text, then performs the first refresh.
    pub async fn load(&self) -> Result<BalanceSnapshot, StatusError> {
        let show_icon = self.display().show_icon;
        self.sink
            .show(&StatusItem::new(StatusKind::Loading, format_loading(show_icon)));
        self.refresh().await
    }

    /// User-initiated refresh with fresh balances and prices.
    ///
    /// Fails with `RefreshInProgress` while another manual refresh runs.
    /// Failures are shown in the status line and returned.
    pub async fn refresh(&self) -> Result<BalanceSnapshot, StatusError> {
        if self.refreshing.swap(true, Ordering::SeqCst) {
            debug!("refresh already in progress");
            return Err(StatusError::RefreshInProgress);
        }
        let _guard = RefreshGuard(&self.refreshing);

        let show_icon = self.display().show_icon;
        if !self.service.is_configured() {
            self.sink.show(&StatusItem::new(
                StatusKind::NotConfigured,
                format_not_configured(show_icon),
            ));
            return Err(ExchangeError::NotConfigured.into());
        }

        match self.service.compute_total(false).await {
            Ok(snapshot) => {
                self.render(&snapshot, false).await;
                Ok(snapshot)
            }
            Err(e) => {
                error!(error = %e, "balance refresh failed");
                let item = StatusItem::new(StatusKind::Error, format_error(show_icon))
                    .with_tooltip(e.to_string());
                self.sink.show(&item);
                Err(e.into())
            }
        }
    }

    /// Converts a USDT amount to the display currency.
    pub async fn convert(
        &self,
        amount_usdt: Decimal,
        currency: DisplayCurrency,
        prefer_cache: bool,
    ) -> Result<Decimal, ExchangeError> {
        let Some(symbol) = currency.conversion_symbol() else {
            return Ok(amount_usdt);
        };

        let price = self.service.get_price(&symbol, prefer_cache).await?;
        amount_usdt
            .checked_div(price)
            .ok_or_else(|| ExchangeError::PriceUnavailable {
                symbol,
                reason: format!("cannot divide by {}", price),
            })
    }

    async fn render(&self, snapshot: &BalanceSnapshot, prefer_cache: bool) {
        let display = self.display();
        let currency = display.display_currency;

        let (amount, currency) = match self
            .convert(snapshot.total_usdt, currency, prefer_cache)
            .await
        {
            Ok(amount) => (amount, currency),
            Err(e) => {
                warn!(currency = %currency, error = %e, "conversion failed, showing USDT");
                (snapshot.total_usdt, DisplayCurrency::Usdt)
            }
        };

        let item = StatusItem::new(
            StatusKind::Value,
            format_status_text(amount, currency, display.show_icon),
        )
        .with_tooltip(format_tooltip(snapshot));
        self.sink.show(&item);
    }

    /// Runs the periodic refresh until `shutdown` fires.
    ///
    /// Before the first successful computation each tick is a full refresh;
    /// afterwards it only requests a throttled background recomputation.
    pub fn spawn_refresh_timer(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let bar = Arc::clone(self);
        tokio::spawn(async move {
            info!(interval = ?bar.display().refresh_interval, "refresh timer started");
            loop {
                let period = bar.display().refresh_interval;
                tokio::select! {
                    _ = tokio::time::sleep(period) => bar.on_timer().await,
                    _ = shutdown.changed() => break,
                }
            }
            debug!("refresh timer stopped");
        })
    }

    async fn on_timer(&self) {
        if self.service.is_initialized() {
            self.service.request_silent_refresh();
            return;
        }

        match self.refresh().await {
            Ok(_) | Err(StatusError::RefreshInProgress) => {}
            Err(e) => debug!(error = %e, "timed refresh failed"),
        }
    }
}

#[cfg(test)]
mod tests;
