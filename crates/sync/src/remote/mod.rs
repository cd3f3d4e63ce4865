//! Typed read/write surface over the hosted catalog backend.
//!
//! Every row entering the core passes through [`convert`], the single
//! normalization choke point: unknown fields dropped, missing optionals
//! defaulted, ratings clamped. The rest of the core never sees a raw row.
//!
//! Two backings exist behind one trait: the REST client used in
//! production and an in-memory table for tests and offline development.
//! Business logic never branches on which one is active.

pub mod convert;
pub mod memory;
pub mod rest;

pub use memory::MemoryCatalogBackend;
pub use rest::RestCatalogClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sugbo_core::{CatalogEntry, Coordinates, DietaryFlag, EntityKind};

use crate::error::Result;

/// Filters and paging for a catalog list call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Equality filter on the category tag.
    pub category: Option<String>,
    /// Equality filter on the featured flag.
    pub featured: Option<bool>,
    /// Case-insensitive substring search over name, description, location.
    pub search: Option<String>,
    /// Lower bound (inclusive) on `created_at`.
    pub created_after: Option<DateTime<Utc>>,
    /// Upper bound (inclusive) on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
    /// Dietary flag filter; only meaningful for delicacies.
    pub dietary: Option<DietaryFlag>,
    /// Offset into the result set.
    pub offset: u32,
    /// Page size; `None` means the backend default.
    pub limit: Option<u32>,
}

impl ListQuery {
    /// Whether this is the unfiltered default query (servable from cache).
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub const fn with_featured(mut self, featured: bool) -> Self {
        self.featured = Some(featured);
        self
    }

    #[must_use]
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    #[must_use]
    pub const fn with_dietary(mut self, flag: DietaryFlag) -> Self {
        self.dietary = Some(flag);
        self
    }

    #[must_use]
    pub const fn with_page(mut self, offset: u32, limit: u32) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

/// A page of results plus the total match count.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Partial update for a catalog row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<String>,
}

impl CatalogPatch {
    /// The patch a soft delete sends.
    #[must_use]
    pub fn deactivate() -> Self {
        Self {
            is_active: Some(false),
            ..Self::default()
        }
    }

    /// The patch a restore sends.
    #[must_use]
    pub fn activate() -> Self {
        Self {
            is_active: Some(true),
            ..Self::default()
        }
    }
}

/// Typed query/mutation surface over the shared catalog.
///
/// Transient network failures are returned as `Network`; retrying is the
/// caller's policy, never this layer's.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// List active rows, ordered featured-first then newest.
    async fn list_active(&self, kind: EntityKind, query: &ListQuery) -> Result<Page<CatalogEntry>>;

    /// Fetch one row by id, active or not.
    async fn get_by_id(&self, kind: EntityKind, id: &str) -> Result<CatalogEntry>;

    /// Insert a fully-formed row.
    async fn create(&self, entry: CatalogEntry) -> Result<CatalogEntry>;

    /// Patch a row.
    async fn update(&self, kind: EntityKind, id: &str, patch: &CatalogPatch)
    -> Result<CatalogEntry>;

    /// Soft-delete: set `is_active = false`, preserving history.
    async fn soft_delete(&self, kind: EntityKind, id: &str) -> Result<CatalogEntry> {
        self.update(kind, id, &CatalogPatch::deactivate()).await
    }

    /// Undo a soft delete.
    async fn restore(&self, kind: EntityKind, id: &str) -> Result<CatalogEntry> {
        self.update(kind, id, &CatalogPatch::activate()).await
    }
}

/// Whether an entry matches the given query filters (shared by the memory
/// backend and by tests asserting REST parity).
#[must_use]
pub fn matches_query(entry: &CatalogEntry, query: &ListQuery) -> bool {
    if let Some(category) = &query.category
        && entry.category() != category
    {
        return false;
    }
    if let Some(featured) = query.featured
        && entry.featured() != featured
    {
        return false;
    }
    if let Some(term) = &query.search {
        let term = term.to_lowercase();
        let haystacks = match entry {
            CatalogEntry::Destination(d) => {
                [d.name.as_str(), d.description.as_str(), d.location.as_str()]
            }
            CatalogEntry::Delicacy(d) => {
                [d.name.as_str(), d.description.as_str(), d.location.as_str()]
            }
        };
        if !haystacks.iter().any(|h| h.to_lowercase().contains(&term)) {
            return false;
        }
    }
    if let Some(after) = query.created_after
        && entry.created_at() < after
    {
        return false;
    }
    if let Some(before) = query.created_before
        && entry.created_at() > before
    {
        return false;
    }
    if let Some(flag) = query.dietary {
        match entry {
            CatalogEntry::Delicacy(d) => {
                if !d.dietary_flags.contains(&flag) {
                    return false;
                }
            }
            CatalogEntry::Destination(_) => return false,
        }
    }
    true
}
