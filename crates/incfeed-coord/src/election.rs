//! Lease-based leader election over the shared store.
//!
//! Acquisition is read → write → confirm-read. Two tabs that both read an
//! expired record and both write will both confirm against the same final
//! record, so exactly one of them sees its own id and the other stands
//! down. The three phases are exposed separately so that interleavings can
//! be replayed.

use incfeed_core::types::{LeaseRecord, TabId};
use incfeed_store::{FeedState, SharedStore, StoreError};

// ─── Observed State ─────────────────────────────────────────────────

/// What a tab sees when it reads the lease record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    Unclaimed,
    ClaimedByOther,
    Leader,
    Expired,
}

impl LeaseState {
    pub fn observe(lease: Option<&LeaseRecord>, tab: &TabId, now_ms: u64) -> Self {
        match lease {
            None => Self::Unclaimed,
            Some(lease) if lease.is_expired(now_ms) => Self::Expired,
            Some(lease) if lease.is_held_by(tab) => Self::Leader,
            Some(_) => Self::ClaimedByOther,
        }
    }
}

/// Result of one heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Was a follower, now holds the lease.
    Acquired,
    /// Was leader and refreshed the lease.
    Renewed,
    /// Was leader, but the record names someone else (or is gone).
    Lost,
    /// Still a follower.
    Follower,
}

// ─── Claim Phases ───────────────────────────────────────────────────

/// Permission to write a claim: the record was absent or expired when read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimTicket {
    record: LeaseRecord,
}

impl ClaimTicket {
    /// Write the claim. Another tab may overwrite it before confirmation.
    pub fn stake<S: SharedStore>(self, state: &FeedState<S>) -> Result<PendingClaim, StoreError> {
        state.write_lease(&self.record)?;
        Ok(PendingClaim {
            record: self.record,
        })
    }
}

/// A written claim awaiting its confirming read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingClaim {
    record: LeaseRecord,
}

// ─── LeaseElection ──────────────────────────────────────────────────

/// Per-tab view of the leader lease.
#[derive(Debug, Clone)]
pub struct LeaseElection {
    tab_id: TabId,
    ttl_ms: u64,
    leader: bool,
    /// Expiry of the last lease this tab wrote for itself.
    expires_at_ms: u64,
}

impl LeaseElection {
    pub fn new(tab_id: TabId, ttl_ms: u64) -> Self {
        Self {
            tab_id,
            ttl_ms,
            leader: false,
            expires_at_ms: 0,
        }
    }

    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    /// Whether this tab believes it is leader. The belief may be stale; see
    /// [`holds_valid`](Self::holds_valid) and [`confirm_holder`](Self::confirm_holder).
    pub fn is_leader(&self) -> bool {
        self.leader
    }

    /// Leader whose own lease has not yet expired at `now_ms`.
    pub fn holds_valid(&self, now_ms: u64) -> bool {
        self.leader && self.expires_at_ms >= now_ms
    }

    pub fn observe<S: SharedStore>(
        &self,
        state: &FeedState<S>,
        now_ms: u64,
    ) -> Result<LeaseState, StoreError> {
        let lease = state.read_lease()?;
        Ok(LeaseState::observe(lease.as_ref(), &self.tab_id, now_ms))
    }

    /// Read phase: `Some` when the record is absent, expired, or already ours.
    pub fn prepare_claim<S: SharedStore>(
        &self,
        state: &FeedState<S>,
        now_ms: u64,
    ) -> Result<Option<ClaimTicket>, StoreError> {
        match self.observe(state, now_ms)? {
            LeaseState::ClaimedByOther => Ok(None),
            LeaseState::Unclaimed | LeaseState::Expired | LeaseState::Leader => {
                Ok(Some(ClaimTicket {
                    record: LeaseRecord::new(self.tab_id.clone(), now_ms, self.ttl_ms),
                }))
            }
        }
    }

    /// Confirm phase: re-read and keep leadership only if our write stuck.
    pub fn confirm_claim<S: SharedStore>(
        &mut self,
        claim: PendingClaim,
        state: &FeedState<S>,
    ) -> Result<bool, StoreError> {
        let confirmed = state
            .read_lease()?
            .is_some_and(|lease| lease.is_held_by(&self.tab_id));
        self.leader = confirmed;
        if confirmed {
            self.expires_at_ms = claim.record.expires_at_ms;
        }
        Ok(confirmed)
    }

    pub fn try_acquire<S: SharedStore>(
        &mut self,
        state: &FeedState<S>,
        now_ms: u64,
    ) -> Result<bool, StoreError> {
        let Some(ticket) = self.prepare_claim(state, now_ms)? else {
            return Ok(false);
        };
        let claim = ticket.stake(state)?;
        self.confirm_claim(claim, state)
    }

    /// Refresh our lease. Any other holder (or a missing record) means
    /// leadership is lost immediately.
    pub fn renew<S: SharedStore>(
        &mut self,
        state: &FeedState<S>,
        now_ms: u64,
    ) -> Result<bool, StoreError> {
        let ours = state
            .read_lease()?
            .is_some_and(|lease| lease.is_held_by(&self.tab_id));
        if !ours {
            self.leader = false;
            return Ok(false);
        }
        let record = LeaseRecord::new(self.tab_id.clone(), now_ms, self.ttl_ms);
        state.write_lease(&record)?;
        self.leader = true;
        self.expires_at_ms = record.expires_at_ms;
        Ok(true)
    }

    /// Delete the record if we hold it. Returns whether this tab believed
    /// it was leader before the call. Safe to call repeatedly.
    pub fn release<S: SharedStore>(&mut self, state: &FeedState<S>) -> Result<bool, StoreError> {
        let was_leader = self.leader;
        self.leader = false;
        if state
            .read_lease()?
            .is_some_and(|lease| lease.is_held_by(&self.tab_id))
        {
            state.remove_lease()?;
        }
        Ok(was_leader)
    }

    /// Leader renews; follower tries to acquire.
    pub fn heartbeat<S: SharedStore>(
        &mut self,
        state: &FeedState<S>,
        now_ms: u64,
    ) -> Result<HeartbeatOutcome, StoreError> {
        if self.leader {
            if self.renew(state, now_ms)? {
                Ok(HeartbeatOutcome::Renewed)
            } else {
                Ok(HeartbeatOutcome::Lost)
            }
        } else if self.try_acquire(state, now_ms)? {
            Ok(HeartbeatOutcome::Acquired)
        } else {
            Ok(HeartbeatOutcome::Follower)
        }
    }

    /// Re-read the record right before acting as leader. Stands down when
    /// the record no longer names this tab or has expired.
    pub fn confirm_holder<S: SharedStore>(
        &mut self,
        state: &FeedState<S>,
        now_ms: u64,
    ) -> Result<bool, StoreError> {
        if !self.leader {
            return Ok(false);
        }
        let valid = self.observe(state, now_ms)? == LeaseState::Leader;
        if !valid {
            self.leader = false;
        }
        Ok(valid)
    }
}
