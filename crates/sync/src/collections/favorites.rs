//! Favorited destinations, most recent first.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use sugbo_core::{Destination, DestinationId, Favorite, FavoriteSnapshot};

use crate::error::Result;
use crate::store::{KeyValueStore, ScopedKeys};

use super::{load_or_default, save_json};

struct State {
    keys: ScopedKeys,
    items: Vec<Favorite>,
}

/// A user's favorites list. At most one entry per destination; adding an
/// existing favorite is a no-op.
pub struct FavoritesCollection {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<State>,
}

impl FavoritesCollection {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, scope: &str) -> Self {
        Self {
            store,
            state: Mutex::new(State {
                keys: ScopedKeys::for_identity(scope),
                items: Vec::new(),
            }),
        }
    }

    /// Swap the identity scope and drop the working copy.
    pub async fn set_scope(&self, scope: &str) {
        let mut state = self.state.lock().await;
        state.keys = ScopedKeys::for_identity(scope);
        state.items.clear();
    }

    /// Load the current scope's favorites from the store.
    pub async fn load(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.items = load_or_default(self.store.as_ref(), &state.keys.favorites()).await?;
        Ok(())
    }

    /// Current favorites, most recently added first.
    pub async fn list(&self) -> Vec<Favorite> {
        self.state.lock().await.items.clone()
    }

    /// Whether the destination is favorited.
    pub async fn contains(&self, destination_id: &DestinationId) -> bool {
        self.state
            .lock()
            .await
            .items
            .iter()
            .any(|f| f.destination_id == *destination_id)
    }

    /// Add a favorite, capturing a render snapshot of the destination.
    /// Returns `false` when it was already present.
    pub async fn add(&self, destination: &Destination) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state
            .items
            .iter()
            .any(|f| f.destination_id == destination.id)
        {
            return Ok(false);
        }
        state.items.insert(
            0,
            Favorite {
                destination_id: destination.id.clone(),
                added_at: Utc::now(),
                snapshot: FavoriteSnapshot::from(destination),
            },
        );
        save_json(self.store.as_ref(), &state.keys.favorites(), &state.items).await?;
        Ok(true)
    }

    /// Remove a favorite. Returns `false` when it was not present.
    pub async fn remove(&self, destination_id: &DestinationId) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.items.len();
        state.items.retain(|f| f.destination_id != *destination_id);
        if state.items.len() == before {
            return Ok(false);
        }
        save_json(self.store.as_ref(), &state.keys.favorites(), &state.items).await?;
        Ok(true)
    }

    /// Drop every favorite for the current scope.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.items.clear();
        self.store.remove(&state.keys.favorites()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn destination(id: &str) -> Destination {
        Destination {
            id: DestinationId::new(id),
            name: format!("dest {id}"),
            location: "Moalboal".to_owned(),
            category: "diving".to_owned(),
            description: String::new(),
            coordinates: None,
            images: vec![format!("https://img.example/{id}.jpg")],
            rating: 4.5,
            review_count: 12,
            featured: false,
            is_active: true,
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
            updated_at: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_add_is_idempotent_and_ordered() {
        let store = Arc::new(MemoryStore::new());
        let favorites = FavoritesCollection::new(store, "u-1");

        assert!(favorites.add(&destination("a")).await.unwrap());
        assert!(favorites.add(&destination("b")).await.unwrap());
        assert!(!favorites.add(&destination("a")).await.unwrap(), "duplicate is a no-op");

        let list = favorites.list().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].destination_id.as_str(), "b", "most recent first");
        assert_eq!(list[0].snapshot.image.as_deref(), Some("https://img.example/b.jpg"));
    }

    #[tokio::test]
    async fn test_remove_and_persistence() {
        let store = Arc::new(MemoryStore::new());
        let favorites = FavoritesCollection::new(Arc::clone(&store) as _, "u-1");
        favorites.add(&destination("a")).await.unwrap();
        favorites.add(&destination("b")).await.unwrap();

        assert!(favorites.remove(&DestinationId::new("a")).await.unwrap());
        assert!(!favorites.remove(&DestinationId::new("a")).await.unwrap());

        // A fresh collection over the same store sees the persisted state.
        let reloaded = FavoritesCollection::new(store as _, "u-1");
        reloaded.load().await.unwrap();
        let list = reloaded.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].destination_id.as_str(), "b");
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let store = Arc::new(MemoryStore::new());
        let favorites = FavoritesCollection::new(store, "u-1");
        favorites.add(&destination("a")).await.unwrap();

        favorites.set_scope("u-2").await;
        favorites.load().await.unwrap();
        assert!(favorites.list().await.is_empty());

        favorites.set_scope("u-1").await;
        favorites.load().await.unwrap();
        assert_eq!(favorites.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_payload_falls_back_to_empty() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("@tourist_app_favorites_u-1", "not json at all")
            .await
            .unwrap();
        let favorites = FavoritesCollection::new(store, "u-1");
        favorites.load().await.unwrap();
        assert!(favorites.list().await.is_empty());
    }
}
