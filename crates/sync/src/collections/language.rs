//! The user's language preference.
//!
//! A stored tag the app no longer recognizes (removed locale, corrupted
//! value) silently falls back to the default rather than wedging startup.
//! Change listeners fire only on an actual change.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::warn;

use sugbo_core::LanguageTag;

use crate::error::Result;
use crate::store::{KeyValueStore, ScopedKeys};

type LanguageListener = Arc<dyn Fn(LanguageTag) + Send + Sync>;

/// Handle returned by [`LanguagePreference::on_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LanguageListenerHandle(u64);

struct State {
    keys: ScopedKeys,
    current: LanguageTag,
}

pub struct LanguagePreference {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<State>,
    listeners: std::sync::Mutex<Vec<(u64, LanguageListener)>>,
    next_handle: AtomicU64,
}

impl LanguagePreference {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, scope: &str) -> Self {
        Self {
            store,
            state: Mutex::new(State {
                keys: ScopedKeys::for_identity(scope),
                current: LanguageTag::default(),
            }),
            listeners: std::sync::Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    pub async fn set_scope(&self, scope: &str) {
        let mut state = self.state.lock().await;
        state.keys = ScopedKeys::for_identity(scope);
        state.current = LanguageTag::default();
    }

    pub async fn load(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let stored = self.store.get(&state.keys.language()).await?;
        state.current = match stored {
            None => LanguageTag::default(),
            Some(raw) => LanguageTag::from_str(&raw).unwrap_or_else(|err| {
                warn!(value = %raw, error = %err, "unrecognized stored language, using default");
                LanguageTag::default()
            }),
        };
        Ok(())
    }

    /// The active language.
    pub async fn current(&self) -> LanguageTag {
        self.state.lock().await.current
    }

    /// Set the language from a tag string and persist it.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an unsupported tag; the current language is
    /// unchanged.
    pub async fn set(&self, tag: &str) -> Result<LanguageTag> {
        let parsed = LanguageTag::from_str(tag)?;
        let mut state = self.state.lock().await;
        let changed = state.current != parsed;
        state.current = parsed;
        self.store
            .set(&state.keys.language(), parsed.as_str())
            .await?;
        drop(state);
        if changed {
            self.notify(parsed);
        }
        Ok(parsed)
    }

    /// Register a change listener.
    pub fn on_change(
        &self,
        listener: impl Fn(LanguageTag) + Send + Sync + 'static,
    ) -> LanguageListenerHandle {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.listeners_guard().push((id, Arc::new(listener)));
        LanguageListenerHandle(id)
    }

    /// Remove a change listener.
    pub fn remove_listener(&self, handle: LanguageListenerHandle) {
        self.listeners_guard().retain(|(id, _)| *id != handle.0);
    }

    /// Drop the stored preference and return to the default.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let changed = state.current != LanguageTag::default();
        state.current = LanguageTag::default();
        self.store.remove(&state.keys.language()).await?;
        drop(state);
        if changed {
            self.notify(LanguageTag::default());
        }
        Ok(())
    }

    fn notify(&self, tag: LanguageTag) {
        let listeners: Vec<LanguageListener> = self
            .listeners_guard()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(tag);
        }
    }

    fn listeners_guard(&self) -> std::sync::MutexGuard<'_, Vec<(u64, LanguageListener)>> {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_set_persists_and_notifies_once() {
        let language = LanguagePreference::new(Arc::new(MemoryStore::new()), "u-1");
        let seen: Arc<std::sync::Mutex<Vec<LanguageTag>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            language.on_change(move |tag| seen.lock().unwrap().push(tag));
        }

        language.set("ceb").await.unwrap();
        language.set("ceb").await.unwrap();

        assert_eq!(language.current().await, LanguageTag::Ceb);
        assert_eq!(*seen.lock().unwrap(), vec![LanguageTag::Ceb], "no-op set does not notify");
    }

    #[tokio::test]
    async fn test_unsupported_tag_rejected() {
        let language = LanguagePreference::new(Arc::new(MemoryStore::new()), "u-1");
        let err = language.set("klingon").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(language.current().await, LanguageTag::default());
    }

    #[tokio::test]
    async fn test_unknown_stored_value_falls_back_to_default() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("@tourist_app_language_u-1", "xx-removed")
            .await
            .unwrap();
        let language = LanguagePreference::new(store, "u-1");
        language.load().await.unwrap();
        assert_eq!(language.current().await, LanguageTag::En);
    }

    #[tokio::test]
    async fn test_region_tag_roundtrip() {
        let store = Arc::new(MemoryStore::new());
        let language = LanguagePreference::new(Arc::clone(&store) as _, "u-1");
        language.set("zh-CN").await.unwrap();

        let reloaded = LanguagePreference::new(store, "u-1");
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.current().await, LanguageTag::ZhCn);
    }

    #[tokio::test]
    async fn test_removed_listener_stops_firing() {
        let language = LanguagePreference::new(Arc::new(MemoryStore::new()), "u-1");
        let seen = Arc::new(std::sync::Mutex::new(0u32));
        let handle = {
            let seen = Arc::clone(&seen);
            language.on_change(move |_| *seen.lock().unwrap() += 1)
        };

        language.set("fil").await.unwrap();
        language.remove_listener(handle);
        language.set("ja").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), 1);
    }
}
