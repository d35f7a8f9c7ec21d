//! Configuration loading, validation and change detection.
//!
//! Uses serde_yaml to load YAML configuration files with support for
//! environment variable overrides for the API credentials.

mod app;
mod display;
mod duration;
mod error;
mod exchange;
mod watch;

pub use app::AppConfig;
pub use display::DisplayConfig;
pub use error::ConfigError;
pub use exchange::ExchangeConfig;
pub use watch::{ConfigChange, ConfigWatcher};

use serde::Deserialize;
use std::{env, fmt, fs};

/// Environment variable holding the API key.
const API_KEY_ENV: &str = "BINANCE_API_KEY";

/// Environment variable holding the API secret.
const API_SECRET_ENV: &str = "BINANCE_API_SECRET";

/// Root configuration structure.
///
/// Required sections: app. Optional sections: exchange, display.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Application-level settings like name and log level.
    pub app: AppConfig,
    /// Credentials, endpoints and stream settings.
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Refresh cadence and presentation.
    #[serde(default)]
    pub display: DisplayConfig,
}

/// A setting whose change the running client reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    ApiKey,
    ApiSecret,
    Endpoints,
    RefreshInterval,
    SilentRefreshInterval,
    DisplayCurrency,
    ShowIcon,
    LogLevel,
}

impl ConfigKey {
    /// Returns true if the key affects how requests are authenticated or sent.
    pub fn affects_client(&self) -> bool {
        matches!(
            self,
            ConfigKey::ApiKey
                | ConfigKey::ApiSecret
                | ConfigKey::Endpoints
                | ConfigKey::SilentRefreshInterval
        )
    }

    /// Returns true if the running process only picks the key up on restart.
    pub fn requires_restart(&self) -> bool {
        matches!(self, ConfigKey::Endpoints | ConfigKey::LogLevel)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigKey::ApiKey => "apiKey",
            ConfigKey::ApiSecret => "apiSecret",
            ConfigKey::Endpoints => "endpoints",
            ConfigKey::RefreshInterval => "refreshInterval",
            ConfigKey::SilentRefreshInterval => "silentRefreshInterval",
            ConfigKey::DisplayCurrency => "displayCurrency",
            ConfigKey::ShowIcon => "showIcon",
            ConfigKey::LogLevel => "logLevel",
        };
        f.write_str(name)
    }
}

impl Config {
    /// Load configuration from a YAML file at the given path.
    ///
    /// First loads environment variables from `.env` file (if exists),
    /// then the YAML file, then overrides credentials from
    /// `BINANCE_API_KEY` and `BINANCE_API_SECRET`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let content = fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;

        config.apply_credentials(|name| env::var(name).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a YAML string without env overrides.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Overrides credentials with non-empty values from `lookup`.
    fn apply_credentials<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.exchange.api_key = key;
        }
        if let Some(secret) = lookup(API_SECRET_ENV).filter(|v| !v.is_empty()) {
            self.exchange.api_secret = secret;
        }
    }

    /// Validate the configuration.
    ///
    /// Missing credentials are not an error: the client just stays unconfigured.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.app.name.is_empty() {
            return Err(ConfigError::Validation("app.name is required".into()));
        }

        if self.display.refresh_interval.is_zero() {
            return Err(ConfigError::Validation(
                "display.refresh_interval must be positive".into(),
            ));
        }

        if self.display.silent_refresh_interval.is_zero() {
            return Err(ConfigError::Validation(
                "display.silent_refresh_interval must be positive".into(),
            ));
        }

        if self.exchange.websocket.reconnect_delay.is_zero() {
            return Err(ConfigError::Validation(
                "exchange.websocket.reconnect_delay must be positive".into(),
            ));
        }

        if self.exchange.websocket.ping_interval.is_zero() {
            return Err(ConfigError::Validation(
                "exchange.websocket.ping_interval must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Lists the settings that differ from `previous`.
    pub fn changes_from(&self, previous: &Config) -> Vec<ConfigKey> {
        let mut keys = Vec::new();
        let (ex, old_ex) = (&self.exchange, &previous.exchange);
        let (disp, old_disp) = (&self.display, &previous.display);

        if ex.api_key != old_ex.api_key {
            keys.push(ConfigKey::ApiKey);
        }
        if ex.api_secret != old_ex.api_secret {
            keys.push(ConfigKey::ApiSecret);
        }
        if ex.base_url != old_ex.base_url
            || ex.stream_url != old_ex.stream_url
            || ex.request_timeout != old_ex.request_timeout
            || ex.receive_window != old_ex.receive_window
            || ex.websocket != old_ex.websocket
        {
            keys.push(ConfigKey::Endpoints);
        }
        if disp.refresh_interval != old_disp.refresh_interval {
            keys.push(ConfigKey::RefreshInterval);
        }
        if disp.silent_refresh_interval != old_disp.silent_refresh_interval {
            keys.push(ConfigKey::SilentRefreshInterval);
        }
        if disp.display_currency != old_disp.display_currency {
            keys.push(ConfigKey::DisplayCurrency);
        }
        if disp.show_icon != old_disp.show_icon {
            keys.push(ConfigKey::ShowIcon);
        }
        if self.app.log_level != previous.app.log_level {
            keys.push(ConfigKey::LogLevel);
        }

        keys
    }
}
