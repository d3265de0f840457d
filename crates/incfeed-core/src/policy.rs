//! Per-role notification capabilities and the batch filter.
//!
//! Each role maps to a row of a capability table; the filter walks a batch
//! in feed order and returns the first event the local operator may be
//! notified about.

use crate::types::{EventKind, FeedEvent, Identity, Role, Visibility};

/// Which replies a role is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageScope {
    PublicOnly,
    All,
}

/// One row of the capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub messages: MessageScope,
    pub incidence_created: bool,
    pub incidence_assigned: bool,
}

impl Capabilities {
    pub fn for_role(role: &Role) -> Self {
        match role {
            Role::Requester => Self {
                messages: MessageScope::PublicOnly,
                incidence_created: false,
                incidence_assigned: false,
            },
            Role::Admin => Self {
                messages: MessageScope::All,
                incidence_created: true,
                incidence_assigned: false,
            },
            Role::Assignee => Self {
                messages: MessageScope::All,
                incidence_created: false,
                incidence_assigned: true,
            },
            Role::Elevated(_) => Self {
                messages: MessageScope::All,
                incidence_created: false,
                incidence_assigned: false,
            },
        }
    }

    pub fn admits(&self, event: &FeedEvent) -> bool {
        match event.kind {
            EventKind::MessagePosted => match self.messages {
                MessageScope::PublicOnly => event.visibility == Visibility::Public,
                MessageScope::All => true,
            },
            EventKind::IncidenceCreated => self.incidence_created,
            EventKind::IncidenceAssigned => self.incidence_assigned,
        }
    }
}

/// Pick the first event in `events` worth notifying `identity` about.
///
/// Events at or below `cursor` were already accounted for, and events the
/// operator authored never notify them.
pub fn select_notifiable<'a>(
    events: &'a [FeedEvent],
    cursor: u64,
    identity: &Identity,
) -> Option<&'a FeedEvent> {
    let caps = Capabilities::for_role(identity.role());
    events
        .iter()
        .filter(|event| event.seq > cursor)
        .filter(|event| !identity.authored(&event.author))
        .find(|event| caps.admits(event))
}
