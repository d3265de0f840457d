//! Per-tab batch application: filter, notify, advance the cursor.
//!
//! The same batch may arrive twice (self-fetched and broadcast, or two
//! broadcasts after a leadership change). Anything at or below the cursor
//! is rejected, so re-application is a no-op.

use incfeed_core::notification::{Navigator, Notification, NotificationSlot};
use incfeed_core::policy::select_notifiable;
use incfeed_core::types::{FeedEvent, Identity};

/// Outcome of applying one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Batch tip is at or below the cursor; nothing changed.
    Stale,
    Applied {
        cursor: u64,
        notification: Option<Notification>,
    },
}

#[derive(Debug)]
pub struct Dispatcher {
    identity: Identity,
    cursor: u64,
    slot: NotificationSlot,
    preview_chars: usize,
}

impl Dispatcher {
    pub fn new(identity: Identity, cursor: u64, preview_chars: usize) -> Self {
        Self {
            identity,
            cursor,
            slot: NotificationSlot::new(),
            preview_chars,
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.slot.current()
    }

    /// Move the cursor to `tip` without looking at events (priming).
    /// Returns whether the cursor moved.
    pub fn adopt(&mut self, tip: u64) -> bool {
        if tip <= self.cursor {
            return false;
        }
        self.cursor = tip;
        true
    }

    pub fn apply(&mut self, items: &[FeedEvent], tip: u64) -> BatchOutcome {
        let tip = items.iter().map(|e| e.seq).fold(tip, u64::max);
        if tip <= self.cursor {
            return BatchOutcome::Stale;
        }

        let notification = select_notifiable(items, self.cursor, &self.identity)
            .map(|event| Notification::from_event(event, self.preview_chars));
        if let Some(ref n) = notification {
            self.slot.show(n.clone());
        }
        self.cursor = tip;

        BatchOutcome::Applied {
            cursor: tip,
            notification,
        }
    }

    pub fn open(&mut self, navigator: &dyn Navigator) -> Option<u64> {
        self.slot.open(navigator)
    }

    pub fn dismiss(&mut self) -> bool {
        self.slot.dismiss()
    }
}
