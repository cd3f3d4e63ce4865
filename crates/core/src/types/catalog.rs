//! Shared catalog entities: destinations and delicacies.
//!
//! These are the normalized application-model shapes produced by the remote
//! data client. Raw backend rows never leave that layer.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{DelicacyId, DestinationId};

/// The two shared catalog tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Destination,
    Delicacy,
}

impl EntityKind {
    /// Both catalog kinds, in priming order.
    pub const ALL: [Self; 2] = [Self::Destination, Self::Delicacy];

    /// The backend table name for this kind.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Destination => "destinations",
            Self::Delicacy => "delicacies",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// Geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// A curated tourist destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub id: DestinationId,
    pub name: String,
    pub location: String,
    /// Category tag drawn from the admin-configured set (e.g. `beach`,
    /// `heritage`, `adventure`).
    pub category: String,
    pub description: String,
    pub coordinates: Option<Coordinates>,
    /// Image URIs, cover first. The core exposes the raw list; asset
    /// fallback is the UI layer's concern.
    pub images: Vec<String>,
    /// Aggregate rating in `[0, 5]`.
    pub rating: f64,
    pub review_count: u32,
    pub featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dietary flags carried by delicacies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DietaryFlag {
    Vegetarian,
    Vegan,
    GlutenFree,
    Halal,
}

/// A local delicacy.
///
/// Analogous to [`Destination`] with food-specific fields on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delicacy {
    pub id: DelicacyId,
    pub name: String,
    pub location: String,
    pub category: String,
    pub description: String,
    pub coordinates: Option<Coordinates>,
    pub images: Vec<String>,
    pub rating: f64,
    pub review_count: u32,
    pub featured: bool,
    pub is_active: bool,
    /// Where to try it.
    pub restaurant: String,
    /// Free-form price band (e.g. `₱50-150`).
    pub price_range: String,
    pub ingredients: BTreeSet<String>,
    pub allergens: BTreeSet<String>,
    pub dietary_flags: BTreeSet<DietaryFlag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A catalog row of either kind.
///
/// The content cache and the realtime channel are polymorphic over the two
/// catalog tables; this enum is the uniform shape they carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogEntry {
    Destination(Destination),
    Delicacy(Delicacy),
}

impl CatalogEntry {
    /// Which table this entry belongs to.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Destination(_) => EntityKind::Destination,
            Self::Delicacy(_) => EntityKind::Delicacy,
        }
    }

    /// The row ID.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Destination(d) => d.id.as_str(),
            Self::Delicacy(d) => d.id.as_str(),
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Destination(d) => &d.name,
            Self::Delicacy(d) => &d.name,
        }
    }

    /// Category tag.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Destination(d) => &d.category,
            Self::Delicacy(d) => &d.category,
        }
    }

    #[must_use]
    pub const fn featured(&self) -> bool {
        match self {
            Self::Destination(d) => d.featured,
            Self::Delicacy(d) => d.featured,
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        match self {
            Self::Destination(d) => d.is_active,
            Self::Delicacy(d) => d.is_active,
        }
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Destination(d) => d.created_at,
            Self::Delicacy(d) => d.created_at,
        }
    }

    /// The canonical catalog ordering: featured first, then newest, then ID
    /// ascending for determinism.
    #[must_use]
    pub fn catalog_ordering(&self, other: &Self) -> Ordering {
        other
            .featured()
            .cmp(&self.featured())
            .then_with(|| other.created_at().cmp(&self.created_at()))
            .then_with(|| self.id().cmp(other.id()))
    }
}

impl From<Destination> for CatalogEntry {
    fn from(d: Destination) -> Self {
        Self::Destination(d)
    }
}

impl From<Delicacy> for CatalogEntry {
    fn from(d: Delicacy) -> Self {
        Self::Delicacy(d)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn destination(id: &str, featured: bool, created_secs: i64) -> CatalogEntry {
        CatalogEntry::Destination(Destination {
            id: DestinationId::new(id),
            name: format!("Destination {id}"),
            location: "Cebu".to_owned(),
            category: "beach".to_owned(),
            description: String::new(),
            coordinates: None,
            images: vec![],
            rating: 4.0,
            review_count: 3,
            featured,
            is_active: true,
            created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
            updated_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
        })
    }

    #[test]
    fn test_catalog_ordering_featured_first() {
        let mut items = vec![
            destination("a", false, 100),
            destination("b", true, 50),
            destination("c", false, 200),
        ];
        items.sort_by(CatalogEntry::catalog_ordering);
        let ids: Vec<&str> = items.iter().map(CatalogEntry::id).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_catalog_ordering_id_breaks_ties() {
        let mut items = vec![destination("z", false, 100), destination("a", false, 100)];
        items.sort_by(CatalogEntry::catalog_ordering);
        let ids: Vec<&str> = items.iter().map(CatalogEntry::id).collect();
        assert_eq!(ids, vec!["a", "z"]);
    }

    #[test]
    fn test_entity_kind_table_names() {
        assert_eq!(EntityKind::Destination.table(), "destinations");
        assert_eq!(EntityKind::Delicacy.table(), "delicacies");
    }
}
