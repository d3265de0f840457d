//! Async driver: runs one [`Tab`] as a single tokio task.
//!
//! The task owns all tab state and selects over the heartbeat timer, the
//! poll timer, the in-flight fetch, the broadcast subscription, host
//! commands, and cancellation. Nothing else touches the tab.

use std::sync::Arc;

use incfeed_core::notification::{Navigator, Notification};
use incfeed_core::types::{FeedPage, TabId};
use incfeed_store::SharedStore;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::bus::LocalBus;
use crate::clock::Clock;
use crate::message::{BroadcastMsg, Envelope};
use crate::poller::{FeedClient, FeedError, FetchRequest};
use crate::tab::Tab;

const COMMAND_BUFFER: usize = 16;

/// Host-side action on a running tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabCommand {
    /// Open the visible notification and navigate to its ticket.
    Open,
    Dismiss,
    SetVisible(bool),
}

/// Collaborators shared by every tab of a process.
pub struct TabContext<C> {
    pub client: Arc<C>,
    pub bus: LocalBus,
    pub clock: Arc<dyn Clock>,
    pub navigator: Arc<dyn Navigator>,
}

impl<C> Clone for TabContext<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            bus: self.bus.clone(),
            clock: Arc::clone(&self.clock),
            navigator: Arc::clone(&self.navigator),
        }
    }
}

/// Handle to a spawned tab task.
pub struct TabHandle {
    tab_id: TabId,
    commands: mpsc::Sender<TabCommand>,
    notification: watch::Receiver<Option<Notification>>,
    leader: watch::Receiver<bool>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl TabHandle {
    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    pub fn is_leader(&self) -> bool {
        *self.leader.borrow()
    }

    pub fn leadership(&self) -> watch::Receiver<bool> {
        self.leader.clone()
    }

    pub fn notification(&self) -> watch::Receiver<Option<Notification>> {
        self.notification.clone()
    }

    pub fn current_notification(&self) -> Option<Notification> {
        self.notification.borrow().clone()
    }

    /// Returns `false` if the tab has already stopped.
    pub async fn send(&self, command: TabCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    pub async fn open(&self) -> bool {
        self.send(TabCommand::Open).await
    }

    pub async fn set_visible(&self, visible: bool) -> bool {
        self.send(TabCommand::SetVisible(visible)).await
    }

    /// Stop timers, release the lease, and wait for the task to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            tracing::warn!(tab = %self.tab_id, "tab task ended abnormally: {e}");
        }
    }

    /// Abort without teardown, as if the tab crashed. The lease is left to
    /// expire on its own.
    pub fn kill(self) {
        self.join.abort();
    }
}

pub fn spawn_tab<S, C>(tab: Tab<S>, ctx: TabContext<C>) -> TabHandle
where
    S: SharedStore + 'static,
    C: FeedClient,
{
    let tab_id = tab.tab_id().clone();
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (notification_tx, notification_rx) = watch::channel(None);
    let (leader_tx, leader_rx) = watch::channel(false);
    let cancel = CancellationToken::new();

    let task = TabTask {
        tab,
        ctx,
        commands: commands_rx,
        notification: notification_tx,
        leader: leader_tx,
        cancel: cancel.clone(),
    };
    let join = tokio::spawn(task.run());

    TabHandle {
        tab_id,
        commands: commands_tx,
        notification: notification_rx,
        leader: leader_rx,
        cancel,
        join,
    }
}

struct InFlight {
    request: FetchRequest,
    handle: JoinHandle<Result<FeedPage, FeedError>>,
}

struct TabTask<S, C> {
    tab: Tab<S>,
    ctx: TabContext<C>,
    commands: mpsc::Receiver<TabCommand>,
    notification: watch::Sender<Option<Notification>>,
    leader: watch::Sender<bool>,
    cancel: CancellationToken,
}

impl<S, C> TabTask<S, C>
where
    S: SharedStore + 'static,
    C: FeedClient,
{
    async fn run(mut self) {
        let config = self.tab.config().clone();
        let mut subscription = self.ctx.bus.subscribe();
        let mut bus_open = true;
        let mut heartbeat = interval(Duration::from_millis(config.heartbeat_interval_ms));
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poll = interval(Duration::from_millis(config.poll_interval_ms));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Option<InFlight> = None;

        tracing::debug!(tab = %self.tab.tab_id(), channel = %self.tab.channel_name(), "tab task started");

        loop {
            let outbound = tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = heartbeat.tick() => self.tab.on_heartbeat(self.ctx.clock.now_ms()),
                _ = poll.tick() => {
                    if in_flight.is_none() {
                        in_flight = self.start_fetch();
                    }
                    Vec::new()
                }
                joined = async {
                    match in_flight.as_mut() {
                        Some(fetch) => (&mut fetch.handle).await,
                        None => std::future::pending().await,
                    }
                }, if in_flight.is_some() => {
                    let result = joined
                        .unwrap_or_else(|e| Err(FeedError::Transport(format!("fetch task failed: {e}"))));
                    match in_flight.take() {
                        Some(fetch) => {
                            self.tab.complete_fetch(fetch.request, result, self.ctx.clock.now_ms())
                        }
                        None => Vec::new(),
                    }
                }
                raw = subscription.recv(), if bus_open => match raw {
                    Some(raw) => self.tab.on_message(&raw, self.ctx.clock.now_ms()),
                    None => {
                        tracing::debug!(tab = %self.tab.tab_id(), "broadcast topic closed");
                        bus_open = false;
                        Vec::new()
                    }
                },
                Some(command) = self.commands.recv() => {
                    self.handle_command(command);
                    Vec::new()
                }
            };

            self.publish(outbound);
            self.sync_watches();
        }

        if let Some(fetch) = in_flight.take() {
            fetch.handle.abort();
            self.tab.abandon_fetch();
        }
        let outbound = self.tab.teardown(self.ctx.clock.now_ms());
        self.publish(outbound);
        self.sync_watches();
        tracing::debug!(tab = %self.tab.tab_id(), "tab task stopped");
    }

    fn start_fetch(&mut self) -> Option<InFlight> {
        let request = self.tab.next_fetch(self.ctx.clock.now_ms())?;
        let client = Arc::clone(&self.ctx.client);
        let since = request.since();
        let handle = tokio::spawn(async move { client.fetch(since).await });
        Some(InFlight { request, handle })
    }

    fn handle_command(&mut self, command: TabCommand) {
        match command {
            TabCommand::Open => {
                self.tab.open_notification(self.ctx.navigator.as_ref());
            }
            TabCommand::Dismiss => {
                self.tab.dismiss_notification();
            }
            TabCommand::SetVisible(visible) => self.tab.set_visible(visible),
        }
    }

    fn publish(&self, outbound: Vec<BroadcastMsg>) {
        for msg in outbound {
            match Envelope::new(self.tab.tab_id().clone(), msg).encode() {
                Ok(raw) => self.ctx.bus.publish(raw),
                Err(e) => tracing::warn!(tab = %self.tab.tab_id(), "failed to encode broadcast: {e}"),
            }
        }
    }

    fn sync_watches(&self) {
        let current = self.tab.notification().cloned();
        self.notification.send_if_modified(|shown| {
            if *shown == current {
                return false;
            }
            *shown = current;
            true
        });
        let leader = self.tab.is_leader();
        self.leader.send_if_modified(|was| {
            if *was == leader {
                return false;
            }
            *was = leader;
            true
        });
    }
}
