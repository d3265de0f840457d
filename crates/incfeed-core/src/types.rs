use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ─── Event Kind & Visibility ────────────────────────────────────────

/// Kind of a feed event, using the feed's wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A reply was posted on a ticket.
    #[serde(rename = "MSG")]
    MessagePosted,
    /// A new ticket was opened.
    #[serde(rename = "NEW_INC")]
    IncidenceCreated,
    /// A ticket was assigned to someone.
    #[serde(rename = "ASSIGNED")]
    IncidenceAssigned,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessagePosted => "MSG",
            Self::IncidenceCreated => "NEW_INC",
            Self::IncidenceAssigned => "ASSIGNED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    #[serde(rename = "PUBLIC")]
    Public,
    #[serde(rename = "STAFF")]
    Staff,
}

// ─── Feed Event & Page ──────────────────────────────────────────────

/// One record of the update feed. Immutable once observed.
///
/// Field names follow the feed's JSON contract; the Rust names describe
/// what each field means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEvent {
    /// Feed-wide, monotonically increasing sequence id.
    #[serde(rename = "msg_id")]
    pub seq: u64,
    /// Parent ticket.
    #[serde(rename = "inc_id")]
    pub ticket_id: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(rename = "visibilidad")]
    pub visibility: Visibility,
    /// Originating user.
    #[serde(rename = "usuario", default)]
    pub author: String,
    /// Free-text body, used as the notification preview.
    #[serde(rename = "mensaje", default)]
    pub text: String,
    /// Title of the parent ticket.
    #[serde(rename = "titulo", default)]
    pub title: String,
    /// Status of the parent ticket when the event was read.
    #[serde(rename = "estado", default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A single response of the update feed: events oldest first plus the tip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub items: Vec<FeedEvent>,
    /// Current tip of the feed as seen by the server.
    #[serde(default)]
    pub last_id: u64,
}

impl FeedPage {
    /// A page carrying only the tip, as returned to a request without cursor.
    pub fn tip_only(last_id: u64) -> Self {
        Self {
            items: Vec::new(),
            last_id,
        }
    }

    /// Whether this page moves a reader positioned at `cursor` forward.
    pub fn advances(&self, cursor: u64) -> bool {
        !self.items.is_empty() || self.last_id > cursor
    }
}

// ─── Roles & Identity ───────────────────────────────────────────────

/// Operator role. Wire names are upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Restricted role that only sees public replies on its own tickets.
    Requester,
    /// Administrative role; also told about new tickets.
    Admin,
    /// Role that receives ticket assignments.
    Assignee,
    /// Any other staff role. Sees replies only.
    Elevated(String),
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        match upper.as_str() {
            "" | "USUARIO" => Self::Requester,
            "ADMIN" => Self::Admin,
            "PRACTICANTE" => Self::Assignee,
            _ => Self::Elevated(upper),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Requester => "USUARIO",
            Self::Admin => "ADMIN",
            Self::Assignee => "PRACTICANTE",
            Self::Elevated(name) => name,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("username must not be empty")]
    EmptyUsername,
}

/// The (user, role) pair every persisted key and broadcast topic is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    username: String,
    role: Role,
}

impl Identity {
    pub fn new(username: &str, role: Role) -> Result<Self, IdentityError> {
        let username = username.trim().to_lowercase();
        if username.is_empty() {
            return Err(IdentityError::EmptyUsername);
        }
        Ok(Self { username, role })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    /// `user:ROLE`, the suffix shared by all keys and the channel name.
    pub fn scope(&self) -> String {
        format!("{}:{}", self.username, self.role)
    }

    /// Case-insensitive authorship check.
    pub fn authored(&self, author: &str) -> bool {
        author.trim().to_lowercase() == self.username
    }
}

// ─── Tab Identity & Lease ───────────────────────────────────────────

/// Opaque per-tab identifier, fresh for every tab lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted leader lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub holder: TabId,
    /// Expiry in epoch milliseconds.
    pub expires_at_ms: u64,
}

impl LeaseRecord {
    pub fn new(holder: TabId, now_ms: u64, ttl_ms: u64) -> Self {
        Self {
            holder,
            expires_at_ms: now_ms.saturating_add(ttl_ms),
        }
    }

    /// A lease is expired strictly after its expiry instant.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms < now_ms
    }

    pub fn is_held_by(&self, tab: &TabId) -> bool {
        &self.holder == tab
    }
}
