//! Status line display settings.

use serde::Deserialize;
use std::time::Duration;

use super::duration;
use crate::domain::DisplayCurrency;

/// Default interval of the periodic status refresh.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(10_000);

/// Default minimum gap between stream-driven background recomputations.
const DEFAULT_SILENT_REFRESH_INTERVAL: Duration = Duration::from_millis(5_000);

/// How the balance is shown and how often it is refreshed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DisplayConfig {
    /// Period of the status refresh timer.
    #[serde(default = "default_refresh_interval", with = "duration")]
    pub refresh_interval: Duration,
    /// Throttle window for recomputations triggered by price ticks.
    #[serde(default = "default_silent_refresh_interval", with = "duration")]
    pub silent_refresh_interval: Duration,
    /// Currency the total is converted to before display.
    #[serde(default)]
    pub display_currency: DisplayCurrency,
    /// Prefix the status text with an icon.
    #[serde(default = "default_true")]
    pub show_icon: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            silent_refresh_interval: DEFAULT_SILENT_REFRESH_INTERVAL,
            display_currency: DisplayCurrency::default(),
            show_icon: true,
        }
    }
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

fn default_silent_refresh_interval() -> Duration {
    DEFAULT_SILENT_REFRESH_INTERVAL
}

fn default_true() -> bool {
    true
}
