//! In-memory catalog backend for tests and offline development.
//!
//! Mirrors the REST client's observable behavior: same filter semantics,
//! same ordering, same error kinds. Mutations publish change events to an
//! attached [`LocalChangeStream`] so realtime wiring can be exercised
//! without a server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use sugbo_core::{CatalogEntry, ChangeEvent, EntityKind};

use crate::error::{Result, SyncError};
use crate::realtime::LocalChangeStream;

use super::{CatalogBackend, CatalogPatch, ListQuery, Page, matches_query};

#[derive(Default)]
pub struct MemoryCatalogBackend {
    tables: Mutex<HashMap<EntityKind, Vec<CatalogEntry>>>,
    offline: AtomicBool,
    stream: Mutex<Option<Arc<LocalChangeStream>>>,
}

impl MemoryCatalogBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a `Network` error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Publish mutation events to this stream.
    pub fn attach_stream(&self, stream: Arc<LocalChangeStream>) {
        *self
            .stream
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(stream);
    }

    /// Seed a row without going through `create` (no event published).
    pub fn insert_row(&self, entry: CatalogEntry) {
        let kind = entry.kind();
        self.tables_guard().entry(kind).or_default().push(entry);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Network("backend unreachable".to_owned()));
        }
        Ok(())
    }

    fn publish(&self, event: &ChangeEvent) {
        let stream = self
            .stream
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        if let Some(stream) = stream {
            stream.publish(event);
        }
    }

    fn tables_guard(&self) -> MutexGuard<'_, HashMap<EntityKind, Vec<CatalogEntry>>> {
        self.tables
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl CatalogBackend for MemoryCatalogBackend {
    async fn list_active(&self, kind: EntityKind, query: &ListQuery) -> Result<Page<CatalogEntry>> {
        self.check_online()?;
        let tables = self.tables_guard();
        let mut matched: Vec<CatalogEntry> = tables
            .get(&kind)
            .map(|rows| {
                rows.iter()
                    .filter(|e| e.is_active() && matches_query(e, query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matched.sort_by(CatalogEntry::catalog_ordering);

        let total = matched.len() as u64;
        let mut items: Vec<CatalogEntry> =
            matched.into_iter().skip(query.offset as usize).collect();
        if let Some(limit) = query.limit {
            items.truncate(limit as usize);
        }
        Ok(Page { items, total })
    }

    async fn get_by_id(&self, kind: EntityKind, id: &str) -> Result<CatalogEntry> {
        self.check_online()?;
        self.tables_guard()
            .get(&kind)
            .and_then(|rows| rows.iter().find(|e| e.id() == id).cloned())
            .ok_or_else(|| SyncError::NotFound(format!("{kind} {id}")))
    }

    async fn create(&self, entry: CatalogEntry) -> Result<CatalogEntry> {
        self.check_online()?;
        let kind = entry.kind();
        {
            let mut tables = self.tables_guard();
            let rows = tables.entry(kind).or_default();
            if rows.iter().any(|e| e.id() == entry.id()) {
                return Err(SyncError::Conflict(format!(
                    "{kind} {} already exists",
                    entry.id()
                )));
            }
            rows.push(entry.clone());
        }
        self.publish(&ChangeEvent::insert(entry.clone()));
        Ok(entry)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        patch: &CatalogPatch,
    ) -> Result<CatalogEntry> {
        self.check_online()?;
        let (before, after) = {
            let mut tables = self.tables_guard();
            let rows = tables
                .get_mut(&kind)
                .ok_or_else(|| SyncError::NotFound(format!("{kind} {id}")))?;
            let row = rows
                .iter_mut()
                .find(|e| e.id() == id)
                .ok_or_else(|| SyncError::NotFound(format!("{kind} {id}")))?;
            let before = row.clone();
            apply_patch(row, patch);
            (before, row.clone())
        };
        self.publish(&ChangeEvent::update(Some(before), after.clone()));
        Ok(after)
    }
}

fn apply_patch(entry: &mut CatalogEntry, patch: &CatalogPatch) {
    let now = Utc::now();
    match entry {
        CatalogEntry::Destination(d) => {
            if let Some(v) = &patch.name {
                d.name.clone_from(v);
            }
            if let Some(v) = &patch.location {
                d.location.clone_from(v);
            }
            if let Some(v) = &patch.category {
                d.category.clone_from(v);
            }
            if let Some(v) = &patch.description {
                d.description.clone_from(v);
            }
            if let Some(v) = patch.coordinates {
                d.coordinates = Some(v);
            }
            if let Some(v) = &patch.images {
                d.images.clone_from(v);
            }
            if let Some(v) = patch.featured {
                d.featured = v;
            }
            if let Some(v) = patch.is_active {
                d.is_active = v;
            }
            d.updated_at = now;
        }
        CatalogEntry::Delicacy(d) => {
            if let Some(v) = &patch.name {
                d.name.clone_from(v);
            }
            if let Some(v) = &patch.location {
                d.location.clone_from(v);
            }
            if let Some(v) = &patch.category {
                d.category.clone_from(v);
            }
            if let Some(v) = &patch.description {
                d.description.clone_from(v);
            }
            if let Some(v) = patch.coordinates {
                d.coordinates = Some(v);
            }
            if let Some(v) = &patch.images {
                d.images.clone_from(v);
            }
            if let Some(v) = patch.featured {
                d.featured = v;
            }
            if let Some(v) = patch.is_active {
                d.is_active = v;
            }
            if let Some(v) = &patch.restaurant {
                d.restaurant.clone_from(v);
            }
            if let Some(v) = &patch.price_range {
                d.price_range.clone_from(v);
            }
            d.updated_at = now;
        }
    }
}
