//! incfeed-coord: coordinates the notifier across sibling tabs.
//!
//! One tab at a time holds a lease in the shared store and polls the
//! update feed; it fans each batch out over the broadcast topic, and every
//! tab filters the batch for its operator and advances the shared cursor.

pub mod bus;
pub mod clock;
pub mod dispatcher;
pub mod driver;
pub mod election;
pub mod message;
pub mod poller;
pub mod tab;

pub use bus::{BusHub, BusSubscription, LocalBus};
pub use clock::{Clock, SystemClock, TokioClock};
pub use dispatcher::{BatchOutcome, Dispatcher};
pub use driver::{TabCommand, TabContext, TabHandle, spawn_tab};
pub use election::{HeartbeatOutcome, LeaseElection, LeaseState};
pub use message::{BroadcastMsg, Envelope};
pub use poller::{FeedClient, FeedError, FetchRequest, PollGate};
pub use tab::{Tab, new_tab_id};
