//! Typed access to the three persisted values of one identity: the cursor,
//! the backlog-primed marker, and the leader lease.
//!
//! Every operation is a single-key read or write. The cursor only ever
//! moves forward: writers compare against the persisted value first.

use chrono::Utc;
use incfeed_core::types::{Identity, LeaseRecord};

use crate::{SharedStore, StoreError};

/// Key names derived from an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedKeys {
    pub cursor: String,
    pub primed_at: String,
    pub leader: String,
    /// Name of the broadcast topic for this identity. Never persisted.
    pub channel: String,
}

impl FeedKeys {
    pub fn for_identity(identity: &Identity) -> Self {
        let scope = identity.scope();
        Self {
            cursor: format!("incfeed.cursor.v1:{scope}"),
            primed_at: format!("incfeed.primed_at.v1:{scope}"),
            leader: format!("incfeed.leader.v1:{scope}"),
            channel: format!("incfeed.channel.v1:{scope}"),
        }
    }
}

/// Point-in-time view of an identity's persisted values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub cursor: u64,
    pub primed_at: Option<String>,
    pub lease: Option<LeaseRecord>,
}

pub struct FeedState<S> {
    store: S,
    keys: FeedKeys,
}

impl<S: SharedStore> FeedState<S> {
    pub fn new(store: S, identity: &Identity) -> Self {
        Self {
            store,
            keys: FeedKeys::for_identity(identity),
        }
    }

    pub fn keys(&self) -> &FeedKeys {
        &self.keys
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Cursor ──────────────────────────────────────────────────────

    /// Persisted cursor; absent or unparseable values read as 0.
    pub fn read_cursor(&self) -> Result<u64, StoreError> {
        let Some(raw) = self.store.read(&self.keys.cursor)? else {
            return Ok(0);
        };
        match raw.trim().parse::<u64>() {
            Ok(value) => Ok(value),
            Err(_) => {
                tracing::debug!(key = %self.keys.cursor, raw = %raw, "unparseable cursor, reading as 0");
                Ok(0)
            }
        }
    }

    /// Move the persisted cursor up to `tip` if it is behind.
    /// Returns the persisted value afterwards.
    pub fn advance_cursor(&self, tip: u64) -> Result<u64, StoreError> {
        let current = self.read_cursor()?;
        if tip <= current {
            return Ok(current);
        }
        self.store.write(&self.keys.cursor, &tip.to_string())?;
        Ok(tip)
    }

    // ── Primed marker ───────────────────────────────────────────────

    pub fn primed_at(&self) -> Result<Option<String>, StoreError> {
        self.store.read(&self.keys.primed_at)
    }

    pub fn is_primed(&self) -> Result<bool, StoreError> {
        Ok(self.primed_at()?.is_some())
    }

    /// Set the marker to the current time. A marker that is already set is kept.
    pub fn mark_primed(&self) -> Result<(), StoreError> {
        if self.is_primed()? {
            return Ok(());
        }
        self.store
            .write(&self.keys.primed_at, &Utc::now().to_rfc3339())
    }

    // ── Lease ───────────────────────────────────────────────────────

    /// Current lease record; an undecodable record reads as absent.
    pub fn read_lease(&self) -> Result<Option<LeaseRecord>, StoreError> {
        let Some(raw) = self.store.read(&self.keys.leader)? else {
            return Ok(None);
        };
        match serde_json::from_str::<LeaseRecord>(&raw) {
            Ok(lease) => Ok(Some(lease)),
            Err(e) => {
                tracing::debug!(key = %self.keys.leader, "undecodable lease record: {e}");
                Ok(None)
            }
        }
    }

    pub fn write_lease(&self, lease: &LeaseRecord) -> Result<(), StoreError> {
        let raw = serde_json::to_string(lease)?;
        self.store.write(&self.keys.leader, &raw)
    }

    pub fn remove_lease(&self) -> Result<(), StoreError> {
        self.store.remove(&self.keys.leader)
    }

    // ── Whole identity ──────────────────────────────────────────────

    pub fn snapshot(&self) -> Result<FeedSnapshot, StoreError> {
        Ok(FeedSnapshot {
            cursor: self.read_cursor()?,
            primed_at: self.primed_at()?,
            lease: self.read_lease()?,
        })
    }

    /// Forget everything stored for this identity (logout).
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(&self.keys.cursor)?;
        self.store.remove(&self.keys.primed_at)?;
        self.store.remove(&self.keys.leader)
    }
}
