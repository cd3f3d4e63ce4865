//! Local key-value store adapter.
//!
//! The platform persistent store is abstracted behind [`KeyValueStore`]:
//! string keys, opaque string values, async operations. Callers serialize.
//! Per-key ordering is FIFO from a single caller; cross-process writers are
//! out of scope.
//!
//! Identity scoping is not optional sugar: every user-scoped key must be
//! built through [`keys::ScopedKeys`], which is the only path that embeds an
//! identity into a key. See `keys` for the canonical scheme.

pub mod file;
pub mod keys;
pub mod memory;

pub use file::FileStore;
pub use keys::ScopedKeys;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;

/// Uniform async access to a string-keyed persistent store.
///
/// Implementations fail with [`crate::SyncError::StorageUnavailable`] when
/// the platform store is not ready; callers treat that as degraded, not
/// fatal.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// List every key currently present.
    async fn list_keys(&self) -> Result<Vec<String>>;
}
