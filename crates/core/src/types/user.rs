//! User-scoped records: favorites, reviews, email history, support requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::Destination;
use super::email::Email;
use super::id::{DestinationId, ReviewId};

/// The slice of a destination captured when it is favorited.
///
/// Favorites must stay renderable even after the destination is soft-deleted
/// or the cache is cold, so the snapshot carries what a list row needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteSnapshot {
    pub name: String,
    pub location: String,
    pub category: String,
    pub image: Option<String>,
    pub rating: f64,
}

impl From<&Destination> for FavoriteSnapshot {
    fn from(d: &Destination) -> Self {
        Self {
            name: d.name.clone(),
            location: d.location.clone(),
            category: d.category.clone(),
            image: d.images.first().cloned(),
            rating: d.rating,
        }
    }
}

/// A favorited destination.
///
/// At most one favorite exists per (identity, destination) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub destination_id: DestinationId,
    pub added_at: DateTime<Utc>,
    pub snapshot: FavoriteSnapshot,
}

/// A user's review of a destination.
///
/// At most one review exists per (identity, destination) pair; writing again
/// updates in place. `author_id` is `None` for historical reviews written
/// before authorship was recorded; those surface as anonymous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub destination_id: DestinationId,
    /// Integer rating in `1..=5`.
    pub rating: u8,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub likes: u32,
    pub helpful: u32,
    pub author_id: Option<String>,
}

/// One entry in the sign-in email suggestion list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailHistoryEntry {
    pub email: Email,
    pub last_used_at: DateTime<Utc>,
}

/// A support request recorded locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportRequest {
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
