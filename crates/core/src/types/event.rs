//! Realtime change events.

use serde::{Deserialize, Serialize};

use super::catalog::{CatalogEntry, EntityKind};

/// What happened to a catalog row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single-row change delivered by the backend's realtime channel.
///
/// Events are live only; they are never persisted. `before`/`after` carry
/// the normalized row where the wire payload included one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub entity: EntityKind,
    pub id: String,
    pub before: Option<CatalogEntry>,
    pub after: Option<CatalogEntry>,
}

impl ChangeEvent {
    /// An insert event carrying the new row.
    #[must_use]
    pub fn insert(entry: CatalogEntry) -> Self {
        Self {
            kind: ChangeKind::Insert,
            entity: entry.kind(),
            id: entry.id().to_owned(),
            before: None,
            after: Some(entry),
        }
    }

    /// An update event carrying the new row (and optionally the old one).
    #[must_use]
    pub fn update(before: Option<CatalogEntry>, after: CatalogEntry) -> Self {
        Self {
            kind: ChangeKind::Update,
            entity: after.kind(),
            id: after.id().to_owned(),
            before,
            after: Some(after),
        }
    }

    /// A delete event for a row of the given kind.
    #[must_use]
    pub fn delete(entity: EntityKind, id: impl Into<String>, before: Option<CatalogEntry>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            entity,
            id: id.into(),
            before,
            after: None,
        }
    }
}
