//! Feed client seam and the single in-flight guard.

use std::future::Future;

use incfeed_core::types::FeedPage;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("feed transport error: {0}")]
    Transport(String),

    #[error("feed returned status {0}")]
    Status(u16),

    #[error("feed response undecodable: {0}")]
    Decode(String),
}

/// Source of feed pages. `since = None` asks for the tip only.
pub trait FeedClient: Send + Sync + 'static {
    fn fetch(&self, since: Option<u64>)
    -> impl Future<Output = Result<FeedPage, FeedError>> + Send;
}

/// What a tab wants to fetch next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRequest {
    /// Read the tip to initialize the cursor.
    Prime,
    /// Read events after `since`.
    Poll { since: u64 },
}

impl FetchRequest {
    pub fn since(self) -> Option<u64> {
        match self {
            Self::Prime => None,
            Self::Poll { since } => Some(since),
        }
    }
}

/// At most one fetch per tab at a time. A slow feed delays the next
/// request instead of queueing more.
#[derive(Debug, Default)]
pub struct PollGate {
    in_flight: Option<FetchRequest>,
}

impl PollGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Returns `false` (and changes nothing) if a fetch is already running.
    pub fn try_begin(&mut self, request: FetchRequest) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        self.in_flight = Some(request);
        true
    }

    pub fn finish(&mut self) -> Option<FetchRequest> {
        self.in_flight.take()
    }
}
