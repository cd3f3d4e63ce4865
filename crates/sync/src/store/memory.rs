//! In-memory key-value store.
//!
//! Backs tests and the degraded-storage scenarios; `set_available(false)`
//! makes every operation fail with `StorageUnavailable` the way a platform
//! store does before it is ready.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::{Result, SyncError};

use super::KeyValueStore;

/// A `HashMap`-backed [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    available: AtomicBool,
}

impl MemoryStore {
    /// Create an empty, available store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle availability. While unavailable every operation fails with
    /// `StorageUnavailable`; existing data is retained.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::StorageUnavailable(
                "memory store marked unavailable".to_owned(),
            ))
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned lock means a writer panicked mid-insert; the map itself
        // is still structurally sound for a string map.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        self.entries().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.entries().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.check_available()?;
        let mut keys: Vec<String> = self.entries().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v1").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v1".to_owned()));

        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v2".to_owned()));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        // Removing an absent key is fine.
        store.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_keys_sorted() {
        let store = MemoryStore::new();
        store.set("b", "2").await.unwrap();
        store.set("a", "1").await.unwrap();
        assert_eq!(store.list_keys().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryStore::new();
        store.set("k", "v").await.unwrap();
        store.set_available(false);

        let err = store.get("k").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert!(store.set("k", "v2").await.is_err());

        // Data survives the outage.
        store.set_available(true);
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_owned()));
    }
}
