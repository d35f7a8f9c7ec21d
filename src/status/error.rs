use thiserror::Error;

use crate::exchanges::ExchangeError;

/// Status line controller errors.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// A manual refresh was requested while another one is running.
    #[error("a balance refresh is already in progress")]
    RefreshInProgress,
}
