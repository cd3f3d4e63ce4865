//! User-scoped persisted collections.
//!
//! Each collection owns one storage key derived from the active identity
//! scope and keeps an in-memory working copy guarded by an async mutex, so
//! writes to a single collection are serialized. Corrupt persisted JSON is
//! treated as absent: the collection logs and starts from defaults rather
//! than failing every operation forever.
//!
//! Scope changes drop the working copy; nothing read under one identity
//! survives into another. Email history is the one deliberate exception
//! and never rescopes.

pub mod email_history;
pub mod favorites;
pub mod language;
pub mod reviews;
pub mod settings;
pub mod support;

pub use email_history::EmailHistory;
pub use favorites::FavoritesCollection;
pub use language::LanguagePreference;
pub use reviews::ReviewsCollection;
pub use settings::SettingsCollection;
pub use support::SupportHistory;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::capability::DeviceCapabilities;
use crate::error::{Result, SyncError};
use crate::store::KeyValueStore;

/// Load a JSON value from the store, falling back to the default when the
/// key is absent or its payload does not parse.
pub(crate) async fn load_or_default<T>(store: &dyn KeyValueStore, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match store.get(key).await? {
        None => Ok(T::default()),
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(key, error = %err, "corrupt persisted payload, using defaults");
                Ok(T::default())
            }
        },
    }
}

/// Persist a value as JSON under the given key.
pub(crate) async fn save_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw).await
}

/// Every user collection, wired to one store and one identity scope.
pub struct UserCollections {
    favorites: FavoritesCollection,
    reviews: ReviewsCollection,
    email_history: EmailHistory,
    settings: SettingsCollection,
    language: LanguagePreference,
    support: SupportHistory,
}

impl UserCollections {
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        capabilities: Arc<dyn DeviceCapabilities>,
        scope: &str,
    ) -> Self {
        Self {
            favorites: FavoritesCollection::new(Arc::clone(&store), scope),
            reviews: ReviewsCollection::new(Arc::clone(&store), scope),
            email_history: EmailHistory::new(Arc::clone(&store)),
            settings: SettingsCollection::new(Arc::clone(&store), capabilities, scope),
            language: LanguagePreference::new(Arc::clone(&store), scope),
            support: SupportHistory::new(store, scope),
        }
    }

    /// Rescope every identity-scoped collection, dropping working copies.
    /// Email history stays shared across identities.
    pub async fn set_scope(&self, scope: &str) {
        self.favorites.set_scope(scope).await;
        self.reviews.set_scope(scope).await;
        self.settings.set_scope(scope).await;
        self.language.set_scope(scope).await;
        self.support.set_scope(scope).await;
    }

    /// Load every collection, continuing past individual failures.
    /// Returns the failures so the caller can degrade instead of abort.
    pub async fn load_all(&self) -> Vec<(&'static str, SyncError)> {
        let mut failures = Vec::new();
        if let Err(err) = self.favorites.load().await {
            failures.push(("favorites", err));
        }
        if let Err(err) = self.reviews.load().await {
            failures.push(("reviews", err));
        }
        if let Err(err) = self.email_history.load().await {
            failures.push(("email_history", err));
        }
        if let Err(err) = self.settings.load().await {
            failures.push(("settings", err));
        }
        if let Err(err) = self.language.load().await {
            failures.push(("language", err));
        }
        if let Err(err) = self.support.load().await {
            failures.push(("support", err));
        }
        failures
    }

    /// Clear every identity-scoped collection for the current scope.
    ///
    /// # Errors
    ///
    /// Returns the first storage error; later collections are still
    /// attempted.
    pub async fn reset_all(&self) -> Result<()> {
        let results = [
            self.favorites.clear().await,
            self.reviews.clear().await,
            self.settings.clear().await,
            self.language.clear().await,
            self.support.clear().await,
        ];
        results.into_iter().collect()
    }

    #[must_use]
    pub const fn favorites(&self) -> &FavoritesCollection {
        &self.favorites
    }

    #[must_use]
    pub const fn reviews(&self) -> &ReviewsCollection {
        &self.reviews
    }

    #[must_use]
    pub const fn email_history(&self) -> &EmailHistory {
        &self.email_history
    }

    #[must_use]
    pub const fn settings(&self) -> &SettingsCollection {
        &self.settings
    }

    #[must_use]
    pub const fn language(&self) -> &LanguagePreference {
        &self.language
    }

    #[must_use]
    pub const fn support(&self) -> &SupportHistory {
        &self.support
    }
}
