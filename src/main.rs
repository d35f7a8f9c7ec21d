mod balance;
mod config;
mod domain;
mod exchanges;
mod notification;
mod pricing;
mod status;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use balance::BalanceService;
use config::{Config, ConfigChange, ConfigKey, ConfigWatcher};
use exchanges::binance::{BinanceAccount, FeedSettings, WsConnector};
use notification::format_tooltip;
use pricing::PriceCache;
use status::{StatusBar, StdoutSink};
use tokio::sync::watch;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

/// How often the config file is checked for changes.
const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(2);

fn parse_config_path() -> String {
    for arg in env::args().skip(1) {
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    DEFAULT_CONFIG_PATH.to_string()
}

fn init_tracing(log_level: Option<&str>) {
    let level = match log_level {
        Some("debug") => Level::DEBUG,
        Some("info") => Level::INFO,
        Some("warn") | Some("warning") => Level::WARN,
        Some("error") => Level::ERROR,
        Some("trace") => Level::TRACE,
        _ => Level::INFO,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    // Logs go to stderr; stdout carries the status lines.
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[tokio::main]
async fn main() {
    let config_path = parse_config_path();

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config {}: {}", config_path, e);
            std::process::exit(1);
        }
    };

    init_tracing(config.app.log_level.as_deref());

    info!(
        app = %config.app.name,
        config = %config_path,
        currency = %config.display.display_currency,
        "Starting"
    );

    let account = match BinanceAccount::from_config(&config.exchange) {
        Ok(account) => Arc::new(account),
        Err(e) => {
            error!(error = %e, "Failed to create Binance client");
            std::process::exit(1);
        }
    };

    let prices = Arc::new(PriceCache::new(account.clone()));
    let service = Arc::new(BalanceService::new(
        account,
        prices,
        config.display.silent_refresh_interval,
    ));

    if env::args().any(|arg| arg == "--once") {
        if let Err(code) = run_once(&service).await {
            std::process::exit(code);
        }
        return;
    }

    run_live(config, config_path, service).await;
}

/// Computes one fresh snapshot and prints it as JSON.
async fn run_once(service: &BalanceService) -> Result<(), i32> {
    match service.compute_total(false).await {
        Ok(snapshot) => {
            match serde_json::to_string_pretty(&snapshot) {
                Ok(json) => println!("{}", json),
                Err(e) => warn!(error = %e, "Failed to encode snapshot"),
            }
            debug!("{}", format_tooltip(&snapshot));
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Balance computation failed");
            Err(1)
        }
    }
}

async fn run_live(config: Config, config_path: String, service: Arc<BalanceService>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let bar = StatusBar::new(
        service.clone(),
        Arc::new(StdoutSink),
        config.display.clone(),
    );
    bar.attach();

    let ws = &config.exchange.websocket;
    service.start_price_feed(
        FeedSettings::from_config(&config.exchange),
        Arc::new(WsConnector::new(ws.ping_interval)),
    );

    if let Err(e) = bar.load().await {
        warn!(error = %e, "Initial balance load failed");
    }

    let timer = bar.spawn_refresh_timer(shutdown_rx.clone());
    let (watcher, mut changes) =
        ConfigWatcher::new(&config_path, CONFIG_POLL_INTERVAL).spawn(config, shutdown_rx);

    info!("Running, press Ctrl+C to stop");

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Received shutdown signal");
                break;
            }
            Some(change) = changes.recv() => apply_change(&service, &bar, change).await,
        }
    }

    let _ = shutdown_tx.send(true);
    service.shutdown().await;
    for (name, task) in [("refresh timer", timer), ("config watcher", watcher)] {
        if let Err(e) = task.await {
            warn!(task = name, error = %e, "Task failed");
        }
    }

    info!("Shutdown complete");
}

async fn apply_change(service: &Arc<BalanceService>, bar: &StatusBar, change: ConfigChange) {
    let config = &change.config;

    let restart_keys = change.restart_keys();
    if !restart_keys.is_empty() {
        let keys: Vec<String> = restart_keys.iter().map(ToString::to_string).collect();
        warn!(keys = %keys.join(", "), "Settings changed, restart to apply them");
    }

    if change.affects_client() {
        service.refresh_configuration(
            config.exchange.credentials(),
            config.display.silent_refresh_interval,
        );
        if let Err(e) = bar.refresh().await {
            warn!(error = %e, "Refresh after configuration change failed");
        }
    }

    bar.update_display(config.display.clone());
    if change.contains(ConfigKey::DisplayCurrency) || change.contains(ConfigKey::ShowIcon) {
        bar.redraw().await;
    }
}
