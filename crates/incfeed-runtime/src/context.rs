//! Shared helpers for commands: store opening, host routes, output formatting.

use std::path::Path;

use anyhow::Context;
use incfeed_core::notification::{Navigator, Notification};
use incfeed_core::types::Role;
use incfeed_store::SqliteStore;

/// Open the state database, creating its directory on first use.
pub fn open_store(path: &Path) -> anyhow::Result<SqliteStore> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    SqliteStore::open(path).with_context(|| format!("failed to open store {}", path.display()))
}

/// Page the host shows when an operator opens a notification.
pub fn route_for(role: &Role) -> &'static str {
    match role {
        Role::Admin => "/incidencias",
        _ => "/mis-incidencias",
    }
}

/// Terminal stand-in for the host's router.
pub struct RouteNavigator {
    route: &'static str,
}

impl RouteNavigator {
    pub fn for_role(role: &Role) -> Self {
        Self {
            route: route_for(role),
        }
    }
}

impl Navigator for RouteNavigator {
    fn open_ticket(&self, ticket_id: u64) {
        tracing::info!(ticket_id, route = self.route, "navigating");
        println!("  -> {} (incidence #{ticket_id})", self.route);
    }
}

/// Two-line rendering: title, then the indented preview if any.
pub fn format_notification(tab: usize, notification: &Notification) -> String {
    let stamp = chrono::Local::now().format("%H:%M:%S");
    if notification.preview.is_empty() {
        return format!("[{stamp}] tab {tab}: {}", notification.title);
    }
    format!(
        "[{stamp}] tab {tab}: {}\n    {}",
        notification.title, notification.preview
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use incfeed_core::types::EventKind;

    #[test]
    fn routes_follow_role() {
        assert_eq!(route_for(&Role::Admin), "/incidencias");
        assert_eq!(route_for(&Role::Requester), "/mis-incidencias");
        assert_eq!(route_for(&Role::Assignee), "/mis-incidencias");
        assert_eq!(route_for(&Role::parse("soporte")), "/mis-incidencias");
    }

    #[test]
    fn notification_lines() {
        let n = Notification {
            ticket_id: 4,
            seq: 10,
            kind: EventKind::MessagePosted,
            title: "New reply on #4 · Wifi".into(),
            preview: "rebooted the router".into(),
        };
        let text = format_notification(2, &n);
        assert!(text.contains("tab 2: New reply on #4 · Wifi"));
        assert!(text.ends_with("\n    rebooted the router"));

        let bare = Notification {
            preview: String::new(),
            ..n
        };
        assert!(!format_notification(0, &bare).contains('\n'));
    }

    #[test]
    fn open_store_creates_parent_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.db");
        open_store(&path).expect("open");
        assert!(path.exists());
    }
}
