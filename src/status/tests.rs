use super::*;

use std::sync::Mutex;
use std::time::Duration;

use rust_decimal_macros::dec;
use tokio::sync::Notify;

use crate::balance::FRESHNESS_WINDOW;
use crate::balance::mock::{MockAccount, MockPrices, spot};
use crate::pricing::PriceCache;

#[derive(Default)]
struct RecordingSink {
    items: Mutex<Vec<StatusItem>>,
}

impl RecordingSink {
    fn items(&self) -> Vec<StatusItem> {
        self.items.lock().unwrap().clone()
    }

    fn last(&self) -> StatusItem {
        self.items().pop().expect("nothing shown")
    }

    /// Waits until at least `count` items were shown.
    async fn wait_for(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(60), async {
            while self.items().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("status not updated in time");
    }
}

impl DisplaySink for RecordingSink {
    fn show(&self, item: &StatusItem) {
        self.items.lock().unwrap().push(item.clone());
    }
}

struct Fixture {
    api: Arc<MockAccount>,
    service: Arc<BalanceService>,
    sink: Arc<RecordingSink>,
    bar: Arc<StatusBar>,
}

fn display(currency: DisplayCurrency, show_icon: bool) -> DisplayConfig {
    DisplayConfig {
        display_currency: currency,
        show_icon,
        ..DisplayConfig::default()
    }
}

fn fixture(api: MockAccount, prices: &[(&str, Decimal)], display: DisplayConfig) -> Fixture {
    let api = Arc::new(api);
    let cache = Arc::new(PriceCache::new(Arc::new(MockPrices::new(prices))));
    let service = Arc::new(BalanceService::new(
        api.clone(),
        cache,
        display.silent_refresh_interval,
    ));
    let sink = Arc::new(RecordingSink::default());
    let bar = StatusBar::new(service.clone(), sink.clone(), display);
    Fixture {
        api,
        service,
        sink,
        bar,
    }
}

fn btc_holder() -> MockAccount {
    MockAccount::new().with_spot(vec![spot("BTC", dec!(1.5), dec!(0))])
}

#[tokio::test]
async fn test_load_shows_loading_then_value() {
    let f = fixture(
        btc_holder(),
        &[("BTCUSDT", dec!(60000))],
        display(DisplayCurrency::Usdt, true),
    );

    let snap = f.bar.load().await.unwrap();

    assert_eq!(snap.total_usdt, dec!(90000));
    let items = f.sink.items();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].kind, StatusKind::Loading);
    assert_eq!(items[1].kind, StatusKind::Value);
    assert_eq!(items[1].text, "💰 $90,000.00");
    assert!(items[1].tooltip.as_deref().unwrap().contains("Spot: $90,000.00"));
}

#[tokio::test]
async fn test_refresh_converts_to_display_currency() {
    let f = fixture(
        btc_holder(),
        &[("BTCUSDT", dec!(60000))],
        display(DisplayCurrency::Btc, false),
    );

    f.bar.refresh().await.unwrap();

    assert_eq!(f.sink.last().text, "₿1.500000");
}

#[tokio::test]
async fn test_conversion_failure_falls_back_to_usdt() {
    let f = fixture(
        btc_holder(),
        &[("BTCUSDT", dec!(60000))],
        display(DisplayCurrency::Eth, false),
    );

    f.bar.refresh().await.unwrap();

    let item = f.sink.last();
    assert_eq!(item.kind, StatusKind::Value);
    assert_eq!(item.text, "$90,000.00");
}

#[tokio::test]
async fn test_convert_divides_by_price() {
    let f = fixture(
        MockAccount::new(),
        &[("BNBUSDT", dec!(500))],
        DisplayConfig::default(),
    );

    let amount = f
        .bar
        .convert(dec!(1000), DisplayCurrency::Bnb, false)
        .await
        .unwrap();
    assert_eq!(amount, dec!(2));

    let same = f
        .bar
        .convert(dec!(1000), DisplayCurrency::Usdt, false)
        .await
        .unwrap();
    assert_eq!(same, dec!(1000));
}

#[tokio::test]
async fn test_refresh_without_credentials_shows_not_configured() {
    let f = fixture(
        MockAccount::new().unconfigured(),
        &[],
        display(DisplayCurrency::Usdt, false),
    );

    let result = f.bar.refresh().await;

    assert!(matches!(
        result,
        Err(StatusError::Exchange(ExchangeError::NotConfigured))
    ));
    assert_eq!(f.sink.last().kind, StatusKind::NotConfigured);
    assert_eq!(f.api.requests(), 0);
    assert!(!f.bar.is_refreshing());
}

#[tokio::test]
async fn test_refresh_failure_shows_error() {
    let f = fixture(MockAccount::new(), &[], DisplayConfig::default());
    f.api.fail_spot(true);

    let result = f.bar.refresh().await;

    assert!(matches!(result, Err(StatusError::Exchange(_))));
    let item = f.sink.last();
    assert_eq!(item.kind, StatusKind::Error);
    assert!(item.tooltip.unwrap().contains("connection reset"));
    assert!(!f.bar.is_refreshing());
}

#[tokio::test]
async fn test_overlapping_refresh_is_rejected() {
    let gate = Arc::new(Notify::new());
    let f = fixture(
        MockAccount::new()
            .with_spot(vec![spot("USDT", dec!(10), dec!(0))])
            .gated(gate.clone()),
        &[],
        DisplayConfig::default(),
    );

    let first = tokio::spawn({
        let bar = f.bar.clone();
        async move { bar.refresh().await }
    });
    while !f.bar.is_refreshing() {
        tokio::task::yield_now().await;
    }

    assert!(matches!(
        f.bar.refresh().await,
        Err(StatusError::RefreshInProgress)
    ));

    gate.notify_one();
    let snap = first.await.unwrap().unwrap();
    assert_eq!(snap.total_usdt, dec!(10));
    assert!(!f.bar.is_refreshing());
}

#[tokio::test(start_paused = true)]
async fn test_background_update_is_rendered() {
    let f = fixture(
        btc_holder(),
        &[("BTCUSDT", dec!(60000))],
        display(DisplayCurrency::Usdt, false),
    );
    f.bar.attach();
    f.bar.refresh().await.unwrap();
    let shown = f.sink.items().len();

    f.service.prices().put("BTCUSDT", dec!(62000));
    tokio::time::advance(FRESHNESS_WINDOW + Duration::from_secs(1)).await;
    assert!(f.service.request_silent_refresh());

    f.sink.wait_for(shown + 1).await;
    assert_eq!(f.sink.last().text, "$93,000.00");
}

#[tokio::test]
async fn test_update_display_and_redraw() {
    let f = fixture(
        btc_holder(),
        &[("BTCUSDT", dec!(60000))],
        display(DisplayCurrency::Usdt, false),
    );
    f.bar.refresh().await.unwrap();

    f.bar.update_display(display(DisplayCurrency::Btc, true));
    f.bar.redraw().await;

    assert_eq!(f.sink.last().text, "💰 ₿1.500000");
    assert_eq!(f.bar.display().display_currency, DisplayCurrency::Btc);
}

#[tokio::test(start_paused = true)]
async fn test_timer_loads_then_stops_on_shutdown() {
    let f = fixture(
        btc_holder(),
        &[("BTCUSDT", dec!(60000))],
        display(DisplayCurrency::Usdt, false),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let timer = f.bar.spawn_refresh_timer(shutdown_rx);
    f.sink.wait_for(1).await;

    assert_eq!(f.sink.last().text, "$90,000.00");
    assert!(f.service.is_initialized());

    shutdown_tx.send(true).unwrap();
    timer.await.unwrap();
}
