//! Cross-tab broadcast messages and their JSON envelope.

use incfeed_core::types::{FeedEvent, TabId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BroadcastMsg {
    /// The sender primed the cursor to `last_id`.
    #[serde(rename = "prime")]
    Prime { last_id: u64 },
    /// A freshly polled batch and the new tip.
    #[serde(rename = "updates")]
    Updates { items: Vec<FeedEvent>, last_id: u64 },
    #[serde(rename = "leader:claimed")]
    LeaderClaimed { id: TabId },
    #[serde(rename = "leader:released")]
    LeaderReleased { id: TabId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub origin: TabId,
    pub msg: BroadcastMsg,
}

impl Envelope {
    pub fn new(origin: TabId, msg: BroadcastMsg) -> Self {
        Self { origin, msg }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// `None` for anything that is not a well-formed envelope.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}
