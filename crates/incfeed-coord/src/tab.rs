//! One tab's notifier state: election, prime/poll gating, batch dispatch.
//!
//! Pure state machine driven by `now_ms` arguments. It never talks to the
//! network or the bus itself: fetches are requested via [`Tab::next_fetch`]
//! and completed via [`Tab::complete_fetch`], and every method returns the
//! broadcast messages the caller should publish.

use incfeed_core::config::NotifierConfig;
use incfeed_core::notification::{Navigator, Notification};
use incfeed_core::types::{FeedEvent, FeedPage, Identity, TabId};
use incfeed_store::{FeedState, SharedStore, StoreError};
use uuid::Uuid;

use crate::dispatcher::{BatchOutcome, Dispatcher};
use crate::election::{HeartbeatOutcome, LeaseElection};
use crate::message::{BroadcastMsg, Envelope};
use crate::poller::{FeedError, FetchRequest, PollGate};

/// Fresh random tab id.
pub fn new_tab_id() -> TabId {
    TabId::new(Uuid::new_v4().to_string())
}

pub struct Tab<S> {
    identity: Identity,
    config: NotifierConfig,
    state: FeedState<S>,
    election: LeaseElection,
    dispatcher: Dispatcher,
    gate: PollGate,
    primed: bool,
    visible: bool,
}

impl<S: SharedStore> Tab<S> {
    /// Open a tab for `identity`, adopting whatever cursor is persisted.
    pub fn open(identity: Identity, store: S, config: NotifierConfig, tab_id: TabId) -> Self {
        let state = FeedState::new(store, &identity);
        let cursor = state.read_cursor().unwrap_or_else(|e| {
            tracing::warn!(tab = %tab_id, "failed to read cursor: {e}");
            0
        });
        let primed = state.is_primed().unwrap_or_else(|e| {
            tracing::warn!(tab = %tab_id, "failed to read primed marker: {e}");
            false
        });
        tracing::debug!(tab = %tab_id, scope = %identity.scope(), cursor, primed, "tab opened");

        let election = LeaseElection::new(tab_id, config.lease_ttl_ms);
        let dispatcher = Dispatcher::new(identity.clone(), cursor, config.preview_chars);
        Self {
            identity,
            config,
            state,
            election,
            dispatcher,
            gate: PollGate::new(),
            primed,
            visible: true,
        }
    }

    pub fn tab_id(&self) -> &TabId {
        self.election.tab_id()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Broadcast topic shared by every tab of this identity.
    pub fn channel_name(&self) -> &str {
        &self.state.keys().channel
    }

    pub fn feed_state(&self) -> &FeedState<S> {
        &self.state
    }

    pub fn is_leader(&self) -> bool {
        self.election.is_leader()
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }

    pub fn cursor(&self) -> u64 {
        self.dispatcher.cursor()
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.dispatcher.notification()
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            tracing::debug!(tab = %self.tab_id(), visible, "visibility changed");
        }
        self.visible = visible;
    }

    // ── Timers ──────────────────────────────────────────────────────

    /// Heartbeat tick: renew or try to acquire the lease.
    pub fn on_heartbeat(&mut self, now_ms: u64) -> Vec<BroadcastMsg> {
        self.adopt_foreign_prime();

        match self.election.heartbeat(&self.state, now_ms) {
            Ok(HeartbeatOutcome::Acquired) => {
                self.catch_up_cursor();
                self.claimed()
            }
            Ok(HeartbeatOutcome::Lost) => {
                tracing::info!(tab = %self.tab_id(), "leadership lost");
                Vec::new()
            }
            Ok(HeartbeatOutcome::Renewed | HeartbeatOutcome::Follower) => Vec::new(),
            Err(e) => {
                tracing::warn!(tab = %self.tab_id(), "heartbeat store error: {e}");
                Vec::new()
            }
        }
    }

    /// Poll tick: decide whether to start a fetch. The caller must report
    /// the result through [`complete_fetch`](Self::complete_fetch).
    pub fn next_fetch(&mut self, now_ms: u64) -> Option<FetchRequest> {
        if self.gate.is_busy() {
            return None;
        }

        self.adopt_foreign_prime();
        if !self.primed {
            self.gate.try_begin(FetchRequest::Prime);
            return Some(FetchRequest::Prime);
        }

        if !self.visible || !self.election.is_leader() {
            return None;
        }

        match self.election.confirm_holder(&self.state, now_ms) {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(tab = %self.tab_id(), "lease no longer ours, standing down");
                return None;
            }
            Err(e) => {
                tracing::warn!(tab = %self.tab_id(), "lease check failed: {e}");
                return None;
            }
        }

        self.catch_up_cursor();
        let request = FetchRequest::Poll {
            since: self.dispatcher.cursor(),
        };
        self.gate.try_begin(request);
        Some(request)
    }

    /// Settle the in-flight fetch.
    pub fn complete_fetch(
        &mut self,
        request: FetchRequest,
        result: Result<FeedPage, FeedError>,
        _now_ms: u64,
    ) -> Vec<BroadcastMsg> {
        self.gate.finish();

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(tab = %self.tab_id(), ?request, "fetch failed: {e}");
                return Vec::new();
            }
        };

        match request {
            FetchRequest::Prime => self.finish_prime(page.last_id),
            FetchRequest::Poll { .. } => {
                let cursor = self.dispatcher.cursor();
                if !page.advances(cursor) {
                    return Vec::new();
                }
                let last_id = if page.last_id == 0 { cursor } else { page.last_id };
                self.apply_batch(&page.items, last_id);
                vec![BroadcastMsg::Updates {
                    items: page.items,
                    last_id,
                }]
            }
        }
    }

    /// Drop the in-flight marker without a result (fetch task cancelled).
    pub fn abandon_fetch(&mut self) {
        self.gate.finish();
    }

    // ── Broadcast ───────────────────────────────────────────────────

    /// Handle a raw broadcast payload. Malformed payloads and our own
    /// messages are ignored.
    pub fn on_message(&mut self, raw: &str, now_ms: u64) -> Vec<BroadcastMsg> {
        let Some(envelope) = Envelope::decode(raw) else {
            tracing::debug!(tab = %self.tab_id(), "dropping malformed broadcast");
            return Vec::new();
        };
        if &envelope.origin == self.tab_id() {
            return Vec::new();
        }

        match envelope.msg {
            BroadcastMsg::Updates { items, last_id } => {
                self.apply_batch(&items, last_id);
                Vec::new()
            }
            BroadcastMsg::Prime { last_id } => {
                if !self.primed {
                    tracing::debug!(tab = %self.tab_id(), last_id, "adopting sibling prime");
                    self.adopt_cursor(last_id);
                    self.primed = true;
                }
                Vec::new()
            }
            BroadcastMsg::LeaderClaimed { id } => {
                tracing::debug!(tab = %self.tab_id(), leader = %id, "sibling claimed leadership");
                if self.election.is_leader() {
                    if let Err(e) = self.election.confirm_holder(&self.state, now_ms) {
                        tracing::warn!(tab = %self.tab_id(), "lease check failed: {e}");
                    }
                }
                Vec::new()
            }
            BroadcastMsg::LeaderReleased { id } => {
                tracing::debug!(tab = %self.tab_id(), leader = %id, "sibling released leadership");
                if self.election.is_leader() {
                    return Vec::new();
                }
                match self.election.try_acquire(&self.state, now_ms) {
                    Ok(true) => {
                        self.catch_up_cursor();
                        self.claimed()
                    }
                    Ok(false) => Vec::new(),
                    Err(e) => {
                        tracing::warn!(tab = %self.tab_id(), "acquire after release failed: {e}");
                        Vec::new()
                    }
                }
            }
        }
    }

    // ── Host actions ────────────────────────────────────────────────

    pub fn open_notification(&mut self, navigator: &dyn Navigator) -> Option<u64> {
        let opened = self.dispatcher.open(navigator);
        if let Some(ticket_id) = opened {
            tracing::debug!(tab = %self.tab_id(), ticket_id, "notification opened");
        }
        opened
    }

    pub fn dismiss_notification(&mut self) -> bool {
        self.dispatcher.dismiss()
    }

    /// Give up leadership on the way out.
    pub fn teardown(&mut self, _now_ms: u64) -> Vec<BroadcastMsg> {
        self.gate.finish();
        match self.election.release(&self.state) {
            Ok(true) => {
                tracing::info!(tab = %self.tab_id(), "released leadership");
                vec![BroadcastMsg::LeaderReleased {
                    id: self.tab_id().clone(),
                }]
            }
            Ok(false) => Vec::new(),
            Err(e) => {
                tracing::warn!(tab = %self.tab_id(), "lease release failed: {e}");
                Vec::new()
            }
        }
    }

    // ── Internal ────────────────────────────────────────────────────

    fn claimed(&self) -> Vec<BroadcastMsg> {
        tracing::info!(tab = %self.tab_id(), scope = %self.identity.scope(), "leadership acquired");
        vec![BroadcastMsg::LeaderClaimed {
            id: self.tab_id().clone(),
        }]
    }

    /// Pull in progress other tabs persisted while this one missed their
    /// broadcasts. Moves the cursor only; the visible notification stays.
    fn catch_up_cursor(&mut self) {
        match self.state.read_cursor() {
            Ok(persisted) => {
                if self.dispatcher.adopt(persisted) {
                    tracing::debug!(tab = %self.tab_id(), cursor = persisted, "caught up with persisted cursor");
                }
            }
            Err(e) => tracing::warn!(tab = %self.tab_id(), "failed to read cursor: {e}"),
        }
    }

    /// Another tab may have primed while we were not listening; the marker
    /// in the store is authoritative.
    fn adopt_foreign_prime(&mut self) {
        if self.primed {
            return;
        }
        match self.read_prime() {
            Ok(Some(cursor)) => {
                tracing::debug!(tab = %self.tab_id(), cursor, "identity already primed");
                self.dispatcher.adopt(cursor);
                self.primed = true;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(tab = %self.tab_id(), "failed to read primed marker: {e}"),
        }
    }

    fn read_prime(&self) -> Result<Option<u64>, StoreError> {
        if !self.state.is_primed()? {
            return Ok(None);
        }
        Ok(Some(self.state.read_cursor()?))
    }

    fn finish_prime(&mut self, tip: u64) -> Vec<BroadcastMsg> {
        if self.primed {
            return Vec::new();
        }
        self.adopt_cursor(tip);
        if let Err(e) = self.state.mark_primed() {
            tracing::warn!(tab = %self.tab_id(), "failed to persist primed marker: {e}");
        }
        self.primed = true;
        tracing::info!(tab = %self.tab_id(), cursor = self.dispatcher.cursor(), "backlog primed");
        vec![BroadcastMsg::Prime {
            last_id: self.dispatcher.cursor(),
        }]
    }

    fn adopt_cursor(&mut self, tip: u64) {
        self.dispatcher.adopt(tip);
        self.persist_cursor();
    }

    fn apply_batch(&mut self, items: &[FeedEvent], last_id: u64) {
        match self.dispatcher.apply(items, last_id) {
            BatchOutcome::Stale => {}
            BatchOutcome::Applied {
                cursor,
                notification,
            } => {
                if let Some(n) = notification {
                    tracing::info!(
                        tab = %self.tab_id(),
                        ticket_id = n.ticket_id,
                        seq = n.seq,
                        "notification: {}",
                        n.title
                    );
                }
                tracing::debug!(tab = %self.tab_id(), cursor, "cursor advanced");
                self.persist_cursor();
            }
        }
    }

    fn persist_cursor(&self) {
        if let Err(e) = self.state.advance_cursor(self.dispatcher.cursor()) {
            tracing::warn!(tab = %self.tab_id(), "failed to persist cursor: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incfeed_core::types::{EventKind, Role, Visibility};
    use incfeed_store::MemoryStore;

    fn config() -> NotifierConfig {
        NotifierConfig::default()
    }

    fn admin_tab(store: &MemoryStore, id: &str) -> Tab<MemoryStore> {
        let identity = Identity::new("ana", Role::Admin).expect("identity");
        Tab::open(identity, store.clone(), config(), TabId::new(id))
    }

    fn event(seq: u64, kind: EventKind) -> FeedEvent {
        FeedEvent {
            seq,
            ticket_id: seq + 1_000,
            kind,
            visibility: Visibility::Public,
            author: "bob".into(),
            text: "body".into(),
            title: "Title".into(),
            status: "ABIERTA".into(),
            created_at: None,
        }
    }

    fn prime(tab: &mut Tab<MemoryStore>, tip: u64) -> Vec<BroadcastMsg> {
        assert_eq!(tab.next_fetch(0), Some(FetchRequest::Prime));
        tab.complete_fetch(FetchRequest::Prime, Ok(FeedPage::tip_only(tip)), 0)
    }

    // ── 1. fresh_tab_primes_before_polling ──────────────────────────

    #[test]
    fn fresh_tab_primes_before_polling() {
        let store = MemoryStore::new();
        let mut tab = admin_tab(&store, "a");
        assert_eq!(tab.on_heartbeat(0).len(), 1);
        assert!(tab.is_leader());

        assert_eq!(tab.next_fetch(0), Some(FetchRequest::Prime));
        assert_eq!(tab.next_fetch(0), None, "prime still in flight");

        let out = tab.complete_fetch(FetchRequest::Prime, Ok(FeedPage::tip_only(40)), 0);
        assert_eq!(out, vec![BroadcastMsg::Prime { last_id: 40 }]);
        assert!(tab.is_primed());
        assert_eq!(tab.cursor(), 40);
        assert!(tab.notification().is_none());

        assert_eq!(tab.next_fetch(100), Some(FetchRequest::Poll { since: 40 }));
    }

    // ── 2. failed_prime_is_retried ──────────────────────────────────

    #[test]
    fn failed_prime_is_retried() {
        let store = MemoryStore::new();
        let mut tab = admin_tab(&store, "a");
        tab.on_heartbeat(0);
        assert_eq!(tab.next_fetch(0), Some(FetchRequest::Prime));
        let out = tab.complete_fetch(
            FetchRequest::Prime,
            Err(FeedError::Transport("offline".into())),
            0,
        );
        assert!(out.is_empty());
        assert!(!tab.is_primed());
        assert_eq!(tab.next_fetch(10), Some(FetchRequest::Prime));
    }

    // ── 3. second_tab_adopts_persisted_prime ────────────────────────

    #[test]
    fn second_tab_adopts_persisted_prime() {
        let store = MemoryStore::new();
        let mut a = admin_tab(&store, "a");
        prime(&mut a, 25);

        let mut b = admin_tab(&store, "b");
        assert!(b.is_primed());
        assert_eq!(b.cursor(), 25);
        assert_eq!(b.next_fetch(0), None, "follower does not poll");
    }

    // ── 4. prime_broadcast_cancels_pending_prime ────────────────────

    #[test]
    fn prime_broadcast_cancels_pending_prime() {
        let store = MemoryStore::new();
        let mut a = admin_tab(&store, "a");
        let mut b = admin_tab(&store, "b");

        assert_eq!(b.next_fetch(0), Some(FetchRequest::Prime));
        let out = prime(&mut a, 12);
        let raw = Envelope::new(TabId::new("a"), out[0].clone())
            .encode()
            .expect("encode");
        b.on_message(&raw, 0);
        assert!(b.is_primed());
        assert_eq!(b.cursor(), 12);

        // b's own prime lands late and is ignored.
        let late = b.complete_fetch(FetchRequest::Prime, Ok(FeedPage::tip_only(30)), 0);
        assert!(late.is_empty());
        assert_eq!(b.cursor(), 12);
    }

    // ── 5. poll_applies_and_broadcasts ──────────────────────────────

    #[test]
    fn poll_applies_and_broadcasts() {
        let store = MemoryStore::new();
        let mut tab = admin_tab(&store, "a");
        tab.on_heartbeat(0);
        prime(&mut tab, 5);

        let request = tab.next_fetch(10).expect("poll");
        let page = FeedPage {
            items: vec![event(6, EventKind::IncidenceCreated)],
            last_id: 6,
        };
        let out = tab.complete_fetch(request, Ok(page.clone()), 10);
        assert_eq!(
            out,
            vec![BroadcastMsg::Updates {
                items: page.items,
                last_id: 6,
            }]
        );
        assert_eq!(tab.cursor(), 6);
        assert_eq!(tab.feed_state().read_cursor().expect("read"), 6);
        assert_eq!(tab.notification().map(|n| n.ticket_id), Some(1_006));
    }

    // ── 6. empty_poll_is_a_no_op ────────────────────────────────────

    #[test]
    fn empty_poll_is_a_no_op() {
        let store = MemoryStore::new();
        let mut tab = admin_tab(&store, "a");
        tab.on_heartbeat(0);
        prime(&mut tab, 5);
        let request = tab.next_fetch(10).expect("poll");
        assert!(
            tab.complete_fetch(request, Ok(FeedPage::tip_only(5)), 10)
                .is_empty()
        );
        assert!(
            tab.next_fetch(20).is_some(),
            "gate released after empty poll"
        );
    }

    // ── 7. failed_poll_leaves_cursor ────────────────────────────────

    #[test]
    fn failed_poll_leaves_cursor() {
        let store = MemoryStore::new();
        let mut tab = admin_tab(&store, "a");
        tab.on_heartbeat(0);
        prime(&mut tab, 5);
        let request = tab.next_fetch(10).expect("poll");
        let out = tab.complete_fetch(request, Err(FeedError::Status(502)), 10);
        assert!(out.is_empty());
        assert_eq!(tab.cursor(), 5);
        assert!(tab.notification().is_none());
    }

    // ── 8. hidden_leader_skips_polls ────────────────────────────────

    #[test]
    fn hidden_leader_skips_polls() {
        let store = MemoryStore::new();
        let mut tab = admin_tab(&store, "a");
        tab.on_heartbeat(0);
        prime(&mut tab, 5);
        tab.set_visible(false);
        assert_eq!(tab.next_fetch(10), None);
        tab.set_visible(true);
        assert_eq!(tab.next_fetch(10), Some(FetchRequest::Poll { since: 5 }));
    }

    // ── 9. own_and_malformed_messages_ignored ───────────────────────

    #[test]
    fn own_and_malformed_messages_ignored() {
        let store = MemoryStore::new();
        let mut tab = admin_tab(&store, "a");
        prime(&mut tab, 5);
        let own = Envelope::new(
            TabId::new("a"),
            BroadcastMsg::Updates {
                items: vec![event(6, EventKind::MessagePosted)],
                last_id: 6,
            },
        )
        .encode()
        .expect("encode");
        tab.on_message(&own, 0);
        tab.on_message("garbage", 0);
        tab.on_message(r#"{"origin":"z","msg":{"type":"mystery"}}"#, 0);
        assert_eq!(tab.cursor(), 5);
        assert!(tab.notification().is_none());
    }

    // ── 10. release_broadcast_triggers_takeover ─────────────────────

    #[test]
    fn release_broadcast_triggers_takeover() {
        let store = MemoryStore::new();
        let mut a = admin_tab(&store, "a");
        let mut b = admin_tab(&store, "b");
        a.on_heartbeat(0);
        b.on_heartbeat(0);
        assert!(a.is_leader());
        assert!(!b.is_leader());

        let out = a.teardown(100);
        assert_eq!(
            out,
            vec![BroadcastMsg::LeaderReleased {
                id: TabId::new("a")
            }]
        );
        let raw = Envelope::new(TabId::new("a"), out[0].clone())
            .encode()
            .expect("encode");
        let claimed = b.on_message(&raw, 100);
        assert!(b.is_leader());
        assert_eq!(
            claimed,
            vec![BroadcastMsg::LeaderClaimed {
                id: TabId::new("b")
            }]
        );
        assert!(a.teardown(200).is_empty(), "teardown is idempotent");
    }

    // ── 11. foreign_claim_makes_stale_leader_stand_down ─────────────

    #[test]
    fn foreign_claim_makes_stale_leader_stand_down() {
        let store = MemoryStore::new();
        let mut a = admin_tab(&store, "a");
        let mut b = admin_tab(&store, "b");
        a.on_heartbeat(0);
        // a is paused past its TTL; b takes over.
        let out = b.on_heartbeat(10_000);
        assert!(b.is_leader());
        let raw = Envelope::new(TabId::new("b"), out[0].clone())
            .encode()
            .expect("encode");
        a.on_message(&raw, 10_001);
        assert!(!a.is_leader());
    }

    // ── 12. leader_polls_from_persisted_cursor ──────────────────────

    #[test]
    fn leader_polls_from_persisted_cursor() {
        let store = MemoryStore::new();
        let mut tab = admin_tab(&store, "a");
        tab.on_heartbeat(0);
        prime(&mut tab, 5);

        // A sibling in another process advanced the shared cursor.
        tab.feed_state().advance_cursor(30).expect("advance");
        assert_eq!(tab.next_fetch(10), Some(FetchRequest::Poll { since: 30 }));
        assert_eq!(tab.cursor(), 30);
        assert!(tab.notification().is_none());
    }
}
