//! incfeed-store: the shared state store every tab of a profile sees.
//! Synchronous single-key reads and writes, no multi-key atomicity, plus a
//! typed accessor for the per-identity cursor, primed marker, and lease.

pub mod error;
pub mod feed_state;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

pub use error::StoreError;
pub use feed_state::{FeedKeys, FeedSnapshot, FeedState};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Synchronous key/value store with read-after-write visibility across
/// every handle opened on the same backing data.
pub trait SharedStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<S: SharedStore + ?Sized> SharedStore for Arc<S> {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}
