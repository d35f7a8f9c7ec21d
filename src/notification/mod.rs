//! Balance update notification and status text formatting.

mod format;
mod notifier;

pub use format::{
    format_error, format_loading, format_not_configured, format_status_text, format_tooltip,
};
pub use notifier::UpdateNotifier;
