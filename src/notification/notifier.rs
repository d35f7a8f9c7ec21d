use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::BalanceSnapshot;

/// Callback receiving background-computed snapshots.
pub type UpdateCallback = Arc<dyn Fn(&BalanceSnapshot) + Send + Sync>;

/// Single-slot subscription point for background balance updates.
///
/// Holds at most one callback; subscribing again replaces it.
#[derive(Default)]
pub struct UpdateNotifier {
    slot: Mutex<Option<UpdateCallback>>,
}

impl UpdateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`, returning true if it replaced an earlier one.
    pub fn subscribe<F>(&self, callback: F) -> bool
    where
        F: Fn(&BalanceSnapshot) + Send + Sync + 'static,
    {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::new(callback))
            .is_some()
    }

    /// Removes the registered callback, if any.
    pub fn unsubscribe(&self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    #[cfg(test)]
    pub(crate) fn is_subscribed(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Delivers `snapshot` to the subscriber. Returns false if there is none.
    pub fn notify(&self, snapshot: &BalanceSnapshot) -> bool {
        // Clone out so the callback runs without the lock held.
        let callback = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match callback {
            Some(callback) => {
                callback(snapshot);
                true
            }
            None => false,
        }
    }
}
