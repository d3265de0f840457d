use incfeed_core::types::{Identity, LeaseRecord, Role, TabId};
use incfeed_store::{FeedState, SqliteStore};

fn admin() -> Identity {
    Identity::new("ana", Role::Admin).expect("identity")
}

#[test]
fn cursor_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("incfeed.db");

    {
        let leader = FeedState::new(SqliteStore::open(&path).expect("open"), &admin());
        leader.advance_cursor(1_234).expect("advance");
        leader.mark_primed().expect("mark");
        leader
            .write_lease(&LeaseRecord::new(TabId::new("leader-tab"), 10, 7_000))
            .expect("lease");
    }

    let reopened = FeedState::new(SqliteStore::open(&path).expect("reopen"), &admin());
    let snapshot = reopened.snapshot().expect("snapshot");
    assert_eq!(snapshot.cursor, 1_234);
    assert!(snapshot.primed_at.is_some());
    assert_eq!(
        snapshot.lease,
        Some(LeaseRecord::new(TabId::new("leader-tab"), 10, 7_000))
    );
}

#[test]
fn identities_do_not_share_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("incfeed.db");
    let store = std::sync::Arc::new(SqliteStore::open(&path).expect("open"));

    let admin_state = FeedState::new(store.clone(), &admin());
    let requester = Identity::new("ana", Role::Requester).expect("identity");
    let requester_state = FeedState::new(store, &requester);

    admin_state.advance_cursor(50).expect("advance");
    assert_eq!(requester_state.read_cursor().expect("read"), 0);

    requester_state.advance_cursor(7).expect("advance");
    admin_state.clear().expect("logout");
    assert_eq!(admin_state.read_cursor().expect("read"), 0);
    assert_eq!(requester_state.read_cursor().expect("read"), 7);
}
