//! `incfeed watch`: run notifier tabs for one operator until interrupted.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use incfeed_coord::{BusHub, SystemClock, Tab, TabContext, TabHandle, new_tab_id, spawn_tab};
use incfeed_core::config::NotifierConfig;
use incfeed_core::notification::Notification;
use incfeed_store::FeedKeys;
use tokio::sync::{mpsc, watch};

use crate::cli::WatchOpts;
use crate::context::{RouteNavigator, format_notification, open_store};
use crate::http_feed::HttpFeedClient;

enum TabEvent {
    Shown(usize, Notification),
    Leadership(usize, bool),
}

/// Entry point for `incfeed watch`.
pub async fn cmd_watch(
    store_path: &Path,
    config: NotifierConfig,
    opts: &WatchOpts,
) -> anyhow::Result<()> {
    let identity = opts.identity.identity()?;
    let visibility = opts.tab_visibility()?;
    let store = Arc::new(open_store(store_path)?);
    let client = HttpFeedClient::new(
        &opts.base_url,
        opts.token.clone(),
        Duration::from_millis(opts.request_timeout_ms),
    )?;

    let hub = BusHub::new();
    let ctx = TabContext {
        client: Arc::new(client),
        bus: hub.topic(&FeedKeys::for_identity(&identity).channel),
        clock: Arc::new(SystemClock),
        navigator: Arc::new(RouteNavigator::for_role(identity.role())),
    };

    let mut handles: Vec<TabHandle> = Vec::with_capacity(visibility.len());
    for (index, visible) in visibility.iter().copied().enumerate() {
        let tab = Tab::open(
            identity.clone(),
            Arc::clone(&store),
            config.clone(),
            new_tab_id(),
        );
        let handle = spawn_tab(tab, ctx.clone());
        if !visible {
            handle.set_visible(false).await;
            tracing::debug!(tab = %handle.tab_id(), index, "tab starts hidden");
        }
        handles.push(handle);
    }

    tracing::info!(
        scope = %identity.scope(),
        tabs = handles.len(),
        hidden = opts.hidden_tabs,
        store = %store_path.display(),
        "watching {}",
        opts.base_url
    );

    let (events_tx, mut events) = mpsc::unbounded_channel();
    for (index, handle) in handles.iter().enumerate() {
        tokio::spawn(forward_events(
            index,
            handle.notification(),
            handle.leadership(),
            events_tx.clone(),
        ));
    }
    drop(events_tx);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            event = events.recv() => match event {
                Some(TabEvent::Shown(index, notification)) => {
                    println!("{}", format_notification(index, &notification));
                    if opts.auto_open {
                        handles[index].open().await;
                    }
                }
                Some(TabEvent::Leadership(index, leader)) => {
                    if leader {
                        println!("tab {index} is polling");
                    }
                }
                None => {
                    tracing::warn!("all tabs stopped");
                    break;
                }
            },
        }
    }

    for handle in handles {
        handle.shutdown().await;
    }
    tracing::info!("watch stopped");
    Ok(())
}

/// Relay one tab's watch channels into the shared event stream. Ends when
/// the tab stops.
async fn forward_events(
    index: usize,
    mut notification: watch::Receiver<Option<Notification>>,
    mut leadership: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<TabEvent>,
) {
    loop {
        let event = tokio::select! {
            changed = notification.changed() => {
                if changed.is_err() {
                    break;
                }
                match notification.borrow_and_update().clone() {
                    Some(shown) => TabEvent::Shown(index, shown),
                    None => continue,
                }
            }
            changed = leadership.changed() => {
                if changed.is_err() {
                    break;
                }
                TabEvent::Leadership(index, *leadership.borrow_and_update())
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            },
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
                tracing::info!("received ctrl-c, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("received ctrl-c, shutting down");
    }
}
