use tracing::{debug, info};

/// What the status line is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Loading,
    Value,
    NotConfigured,
    Error,
}

/// One rendered status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusItem {
    pub text: String,
    pub tooltip: Option<String>,
    pub kind: StatusKind,
}

impl StatusItem {
    pub fn new(kind: StatusKind, text: String) -> Self {
        Self {
            text,
            tooltip: None,
            kind,
        }
    }

    pub fn with_tooltip(mut self, tooltip: String) -> Self {
        self.tooltip = Some(tooltip);
        self
    }
}

/// Receives every status line update.
pub trait DisplaySink: Send + Sync {
    fn show(&self, item: &StatusItem);
}

/// Writes each status line to stdout, one per update, for bars that read
/// a child process.
pub struct StdoutSink;

impl DisplaySink for StdoutSink {
    fn show(&self, item: &StatusItem) {
        println!("{}", item.text);
        if let Some(tooltip) = &item.tooltip {
            debug!(tooltip = %tooltip, "status tooltip");
        }
        info!(kind = ?item.kind, status = %item.text, "status updated");
    }
}
