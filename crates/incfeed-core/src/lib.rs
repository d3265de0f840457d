//! incfeed-core: feed types, role capabilities, notification formatting,
//! and configuration. Pure logic, no IO beyond reading a config file.

pub mod config;
pub mod notification;
pub mod policy;
pub mod types;

pub use config::{ConfigError, NotifierConfig};
pub use notification::{Navigator, Notification, NotificationSlot};
pub use policy::{Capabilities, MessageScope, select_notifiable};
pub use types::{
    EventKind, FeedEvent, FeedPage, Identity, IdentityError, LeaseRecord, Role, TabId, Visibility,
};
