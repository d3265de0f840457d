//! Notification text and the single visible-notification slot.

use crate::types::{EventKind, FeedEvent};

/// Default preview budget, in characters.
pub const DEFAULT_PREVIEW_CHARS: usize = 120;

/// Host callback run when the operator opens a notification.
pub trait Navigator: Send + Sync {
    fn open_ticket(&self, ticket_id: u64);
}

impl<F> Navigator for F
where
    F: Fn(u64) + Send + Sync,
{
    fn open_ticket(&self, ticket_id: u64) {
        self(ticket_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub ticket_id: u64,
    /// Sequence id of the event that raised it.
    pub seq: u64,
    pub kind: EventKind,
    pub title: String,
    pub preview: String,
}

impl Notification {
    pub fn from_event(event: &FeedEvent, preview_chars: usize) -> Self {
        let title = match event.kind {
            EventKind::IncidenceCreated => {
                format!("New incidence #{} · {}", event.ticket_id, event.title)
            }
            EventKind::IncidenceAssigned => {
                format!("Assigned to you #{} · {}", event.ticket_id, event.title)
            }
            EventKind::MessagePosted => {
                format!("New reply on #{} · {}", event.ticket_id, event.title)
            }
        };
        Self {
            ticket_id: event.ticket_id,
            seq: event.seq,
            kind: event.kind,
            title,
            preview: truncate_chars(&event.text, preview_chars),
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Holds at most one visible notification. A newer one replaces the old.
#[derive(Debug, Default)]
pub struct NotificationSlot {
    current: Option<Notification>,
}

impl NotificationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Notification> {
        self.current.as_ref()
    }

    /// Show `notification`, returning the one it replaced.
    pub fn show(&mut self, notification: Notification) -> Option<Notification> {
        self.current.replace(notification)
    }

    /// Clear the slot and navigate to its ticket. Returns the opened ticket id.
    pub fn open(&mut self, navigator: &dyn Navigator) -> Option<u64> {
        let notification = self.current.take()?;
        navigator.open_ticket(notification.ticket_id);
        Some(notification.ticket_id)
    }

    /// Clear the slot without navigating. Returns whether anything was shown.
    pub fn dismiss(&mut self) -> bool {
        self.current.take().is_some()
    }
}
