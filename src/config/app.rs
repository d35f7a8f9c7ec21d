//! Application-level configuration.

use serde::Deserialize;

/// Application-level settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    /// Application name used in logs.
    pub name: String,
    /// Logging verbosity: "debug", "info", "warn", "error".
    pub log_level: Option<String>,
}
