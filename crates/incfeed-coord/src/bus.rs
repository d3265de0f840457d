//! In-process broadcast topics standing in for the same-origin channel.
//!
//! Delivery is at-most-once with no persistence: a subscriber only sees
//! messages published after it subscribed, and a subscriber that falls
//! behind the buffer loses the oldest messages.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

const DEFAULT_CAPACITY: usize = 64;

/// One topic. Clones publish to and subscribe on the same topic.
#[derive(Debug, Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<String>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to current subscribers. Nobody listening is not an error.
    pub fn publish(&self, payload: String) {
        let _ = self.tx.send(payload);
    }

    pub fn subscribe(&self) -> BusSubscription {
        BusSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BusSubscription {
    rx: broadcast::Receiver<String>,
}

impl BusSubscription {
    /// Next payload, skipping over anything lost to lag.
    /// `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "broadcast subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Named topics, one per channel name.
#[derive(Debug, Default)]
pub struct BusHub {
    topics: Mutex<HashMap<String, LocalBus>>,
}

impl BusHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic(&self, name: &str) -> LocalBus {
        let mut topics = self
            .topics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        topics.entry(name.to_owned()).or_default().clone()
    }
}
