//! The user's destination reviews.
//!
//! One review per destination: writing again updates the existing review
//! in place, keeping its id, creation time, and accumulated reactions.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use sugbo_core::{DestinationId, Review, ReviewId};

use crate::error::{Result, SyncError};
use crate::store::{KeyValueStore, ScopedKeys};

use super::{load_or_default, save_json};

const RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

struct State {
    keys: ScopedKeys,
    items: Vec<Review>,
}

pub struct ReviewsCollection {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<State>,
}

impl ReviewsCollection {
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

    pub async fn set_scope(&self, scope: &str) {
        let mut state = self.state.lock().await;
        state.keys = ScopedKeys::for_identity(scope);
        state.items.clear();
    }

    pub async fn load(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.items = load_or_default(self.store.as_ref(), &state.keys.reviews()).await?;
        Ok(())
    }

    /// All reviews, most recently updated first.
    pub async fn list(&self) -> Vec<Review> {
        let state = self.state.lock().await;
        let mut items = state.items.clone();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        items
    }

    /// The review for one destination, if any.
    pub async fn for_destination(&self, destination_id: &DestinationId) -> Option<Review> {
        self.state
            .lock()
            .await
            .items
            .iter()
            .find(|r| r.destination_id == *destination_id)
            .cloned()
    }

    /// Write or update the review for a destination.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the rating is outside `1..=5`; nothing is
    /// stored in that case.
    pub async fn write(
        &self,
        destination_id: &DestinationId,
        rating: u8,
        text: Option<String>,
    ) -> Result<Review> {
        if !RATING_RANGE.contains(&rating) {
            return Err(SyncError::Validation(format!(
                "rating must be between 1 and 5, got {rating}"
            )));
        }

        let mut state = self.state.lock().await;
        let now = Utc::now();
        let review = if let Some(existing) = state
            .items
            .iter_mut()
            .find(|r| r.destination_id == *destination_id)
        {
            existing.rating = rating;
            existing.text = text;
            existing.updated_at = now;
            existing.clone()
        } else {
            let review = Review {
                id: ReviewId::new(Uuid::new_v4().to_string()),
                destination_id: destination_id.clone(),
                rating,
                text,
                created_at: now,
                updated_at: now,
                likes: 0,
                helpful: 0,
                author_id: Some(state.keys.scope().to_owned()),
            };
            state.items.push(review.clone());
            review
        };
        save_json(self.store.as_ref(), &state.keys.reviews(), &state.items).await?;
        Ok(review)
    }

    /// Record a like on a review.
    pub async fn like(&self, review_id: &ReviewId) -> Result<Review> {
        self.react(review_id, |r| r.likes += 1).await
    }

    /// Record a helpful mark on a review.
    pub async fn mark_helpful(&self, review_id: &ReviewId) -> Result<Review> {
        self.react(review_id, |r| r.helpful += 1).await
    }

    async fn react(&self, review_id: &ReviewId, apply: impl FnOnce(&mut Review)) -> Result<Review> {
        let mut state = self.state.lock().await;
        let review = state
            .items
            .iter_mut()
            .find(|r| r.id == *review_id)
            .ok_or_else(|| SyncError::NotFound(format!("review {review_id}")))?;
        apply(review);
        let review = review.clone();
        save_json(self.store.as_ref(), &state.keys.reviews(), &state.items).await?;
        Ok(review)
    }

    /// Delete the review for a destination. Returns `false` when absent.
    pub async fn remove(&self, destination_id: &DestinationId) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.items.len();
        state.items.retain(|r| r.destination_id != *destination_id);
        if state.items.len() == before {
            return Ok(false);
        }
        save_json(self.store.as_ref(), &state.keys.reviews(), &state.items).await?;
        Ok(true)
    }

    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.items.clear();
        self.store.remove(&state.keys.reviews()).await
    }
}
