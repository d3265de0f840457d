//! `incfeed status` and `incfeed logout`: inspect or clear persisted state.

use std::path::Path;

use incfeed_coord::{Clock, SystemClock};
use incfeed_core::types::Identity;
use incfeed_store::{FeedSnapshot, FeedState, SharedStore};

use crate::cli::{IdentityOpts, StatusOpts};
use crate::context::open_store;

/// Entry point for `incfeed status`.
pub fn cmd_status(store_path: &Path, opts: &StatusOpts) -> anyhow::Result<()> {
    let identity = opts.identity.identity()?;
    let state = FeedState::new(open_store(store_path)?, &identity);
    let snapshot = state.snapshot()?;
    let now_ms = SystemClock.now_ms();

    if opts.json {
        let value = status_json(&identity, &snapshot, now_ms);
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", format_status(&identity, &snapshot, now_ms));
    }
    Ok(())
}

/// Entry point for `incfeed logout`.
pub fn cmd_logout(store_path: &Path, opts: &IdentityOpts) -> anyhow::Result<()> {
    let identity = opts.identity()?;
    let state = FeedState::new(open_store(store_path)?, &identity);
    logout(&state)?;
    println!("cleared notifier state for {}", identity.scope());
    Ok(())
}

fn logout<S: SharedStore>(state: &FeedState<S>) -> anyhow::Result<()> {
    state.clear()?;
    tracing::info!(cursor_key = %state.keys().cursor, "notifier state cleared");
    Ok(())
}

fn lease_summary(snapshot: &FeedSnapshot, now_ms: u64) -> String {
    match &snapshot.lease {
        None => "none".to_string(),
        Some(lease) if lease.is_expired(now_ms) => format!("expired (last held by {})", lease.holder),
        Some(lease) => format!(
            "held by {} for {}ms",
            lease.holder,
            lease.expires_at_ms - now_ms
        ),
    }
}

fn format_status(identity: &Identity, snapshot: &FeedSnapshot, now_ms: u64) -> String {
    let mut out = String::new();
    out.push_str(&format!("operator: {}\n", identity.scope()));
    out.push_str(&format!("cursor:   {}\n", snapshot.cursor));
    out.push_str(&format!(
        "primed:   {}\n",
        snapshot.primed_at.as_deref().unwrap_or("no")
    ));
    out.push_str(&format!("lease:    {}\n", lease_summary(snapshot, now_ms)));
    out
}

fn status_json(identity: &Identity, snapshot: &FeedSnapshot, now_ms: u64) -> serde_json::Value {
    serde_json::json!({
        "user": identity.username(),
        "role": identity.role().as_str(),
        "cursor": snapshot.cursor,
        "primed_at": snapshot.primed_at,
        "lease": snapshot.lease.as_ref().map(|lease| serde_json::json!({
            "holder": lease.holder.as_str(),
            "expires_at_ms": lease.expires_at_ms,
            "expired": lease.is_expired(now_ms),
        })),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use incfeed_core::types::{LeaseRecord, Role, TabId};
    use incfeed_store::MemoryStore;

    fn identity() -> Identity {
        Identity::new("Ana", Role::Assignee).expect("identity")
    }

    #[test]
    fn status_reports_fresh_identity() {
        let state = FeedState::new(MemoryStore::new(), &identity());
        let text = format_status(&identity(), &state.snapshot().expect("snapshot"), 0);
        assert!(text.contains("operator: ana:PRACTICANTE"));
        assert!(text.contains("cursor:   0"));
        assert!(text.contains("primed:   no"));
        assert!(text.contains("lease:    none"));
    }

    #[test]
    fn status_reports_live_and_expired_lease() {
        let state = FeedState::new(MemoryStore::new(), &identity());
        state
            .write_lease(&LeaseRecord::new(TabId::new("t1"), 1_000, 7_000))
            .expect("lease");
        let snapshot = state.snapshot().expect("snapshot");
        assert_eq!(lease_summary(&snapshot, 2_000), "held by t1 for 6000ms");
        assert_eq!(
            lease_summary(&snapshot, 9_000),
            "expired (last held by t1)"
        );

        let json = status_json(&identity(), &snapshot, 9_000);
        assert_eq!(json["lease"]["expired"], true);
        assert_eq!(json["role"], "PRACTICANTE");
    }

    #[test]
    fn logout_clears_only_that_identity() {
        let store = MemoryStore::new();
        let mine = FeedState::new(store.clone(), &identity());
        let admin = Identity::new("ana", Role::Admin).expect("identity");
        let theirs = FeedState::new(store.clone(), &admin);
        mine.advance_cursor(40).expect("cursor");
        mine.mark_primed().expect("primed");
        theirs.advance_cursor(12).expect("cursor");

        logout(&mine).expect("logout");

        let cleared = mine.snapshot().expect("snapshot");
        assert_eq!(cleared.cursor, 0);
        assert!(cleared.primed_at.is_none());
        assert_eq!(theirs.read_cursor().expect("cursor"), 12);
    }
}
