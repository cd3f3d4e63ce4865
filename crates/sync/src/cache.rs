//! Typed in-memory cache of the shared catalog.
//!
//! One entry per catalog kind: the current item list (active rows only, in
//! canonical order), the last successful fetch time, and the TTL. Freshness
//! means `now - last_fetch_at <= ttl` and no invalidation since the fetch.
//!
//! Two mutation sources are serialized here: full refetches through the
//! backend and single-row change events from the realtime channel. Events
//! that arrive while a refetch is in flight are queued and applied after
//! the snapshot replacement, so the final state is always "last writer wins
//! by delivery order". Refetches are single-flight per kind; concurrent
//! callers collapse onto the in-flight fetch (coalescing pattern after
//! bijux-atlas's query coalescer).

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use sugbo_core::{CatalogEntry, ChangeEvent, ChangeKind, EntityKind};

use crate::error::{Result, SyncError};
use crate::remote::{CatalogBackend, ListQuery};

/// Listener invoked with the post-change snapshot of one kind.
pub type ContentListener = Arc<dyn Fn(&[CatalogEntry]) + Send + Sync>;

/// Handle returned by [`ContentCache::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentSubscription(u64);

#[derive(Default)]
struct KindState {
    items: Vec<CatalogEntry>,
    last_fetch_at: Option<Instant>,
    refetching: bool,
    pending_events: Vec<ChangeEvent>,
    /// Bumped on every successful refetch; lets coalesced callers detect
    /// that the fetch they waited on already completed.
    generation: u64,
}

struct ListenerEntry {
    id: u64,
    kind: EntityKind,
    listener: ContentListener,
}

/// Cache of the shared catalog with TTL and event-driven updates.
pub struct ContentCache {
    backend: Arc<dyn CatalogBackend>,
    ttl: Duration,
    states: Mutex<HashMap<EntityKind, KindState>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    refetch_locks: HashMap<EntityKind, tokio::sync::Mutex<()>>,
    next_handle: AtomicU64,
}

impl ContentCache {
    /// Create a cache over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn CatalogBackend>, ttl: Duration) -> Self {
        let mut states = HashMap::new();
        let mut refetch_locks = HashMap::new();
        for kind in EntityKind::ALL {
            states.insert(kind, KindState::default());
            refetch_locks.insert(kind, tokio::sync::Mutex::new(()));
        }
        Self {
            backend,
            ttl,
            states: Mutex::new(states),
            listeners: Mutex::new(Vec::new()),
            refetch_locks,
            next_handle: AtomicU64::new(1),
        }
    }

    /// Get the items of one kind.
    ///
    /// With `use_cache` and a fresh entry, the in-memory list is returned.
    /// Otherwise a refetch runs (at most one in flight per kind; concurrent
    /// callers await it and share its result).
    ///
    /// # Errors
    ///
    /// Returns `FetchFailed` when the refetch fails; the last successful
    /// snapshot stays in place.
    pub async fn get(&self, kind: EntityKind, use_cache: bool) -> Result<Vec<CatalogEntry>> {
        if use_cache && let Some(items) = self.fresh_snapshot(kind) {
            return Ok(items);
        }

        let generation_before = self.generation(kind);
        let lock = self
            .refetch_locks
            .get(&kind)
            .ok_or_else(|| SyncError::Internal(format!("no refetch lock for {kind}")))?;
        let _guard = lock.lock().await;

        // A refetch completed while we waited on the lock; collapse onto it.
        if self.generation(kind) != generation_before {
            return Ok(self.snapshot(kind));
        }
        if use_cache && let Some(items) = self.fresh_snapshot(kind) {
            return Ok(items);
        }

        self.refetch(kind).await
    }

    /// Clear freshness for one kind (or all), forcing the next `get` to
    /// refetch. Items stay available for subscribers until then.
    pub fn invalidate(&self, kind: Option<EntityKind>) {
        let mut states = self.states_guard();
        match kind {
            Some(kind) => {
                if let Some(state) = states.get_mut(&kind) {
                    state.last_fetch_at = None;
                }
            }
            None => {
                for state in states.values_mut() {
                    state.last_fetch_at = None;
                }
            }
        }
        debug!(kind = ?kind, "cache invalidated");
    }

    /// Apply a single change event.
    ///
    /// If a refetch for the kind is in flight the event is queued and
    /// applied once the refetch lands, preserving delivery order against
    /// the replaced snapshot. `last_fetch_at` is untouched; subscribers are
    /// notified with the post-apply snapshot.
    pub fn apply(&self, event: &ChangeEvent) {
        let snapshot = {
            let mut states = self.states_guard();
            let Some(state) = states.get_mut(&event.entity) else {
                return;
            };
            if state.refetching {
                state.pending_events.push(event.clone());
                return;
            }
            apply_to_items(&mut state.items, event);
            state.items.clone()
        };
        self.notify(event.entity, &snapshot);
    }

    /// Register a snapshot listener for one kind. The current snapshot is
    /// delivered synchronously before this returns.
    pub fn subscribe(
        &self,
        kind: EntityKind,
        listener: impl Fn(&[CatalogEntry]) + Send + Sync + 'static,
    ) -> ContentSubscription {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let listener: ContentListener = Arc::new(listener);
        let snapshot = self.snapshot(kind);
        invoke_listener(&listener, &snapshot);
        self.listeners_guard().push(ListenerEntry {
            id,
            kind,
            listener,
        });
        ContentSubscription(id)
    }

    /// Remove a snapshot listener.
    pub fn unsubscribe(&self, subscription: ContentSubscription) {
        self.listeners_guard().retain(|e| e.id != subscription.0);
    }

    /// The current in-memory items of one kind (possibly stale or empty).
    #[must_use]
    pub fn snapshot(&self, kind: EntityKind) -> Vec<CatalogEntry> {
        self.states_guard()
            .get(&kind)
            .map(|s| s.items.clone())
            .unwrap_or_default()
    }

    /// Whether the entry for `kind` is fresh.
    #[must_use]
    pub fn is_fresh(&self, kind: EntityKind) -> bool {
        self.states_guard()
            .get(&kind)
            .and_then(|s| s.last_fetch_at)
            .is_some_and(|at| at.elapsed() <= self.ttl)
    }

    fn fresh_snapshot(&self, kind: EntityKind) -> Option<Vec<CatalogEntry>> {
        let states = self.states_guard();
        let state = states.get(&kind)?;
        let fetched_at = state.last_fetch_at?;
        (fetched_at.elapsed() <= self.ttl).then(|| state.items.clone())
    }

    fn generation(&self, kind: EntityKind) -> u64 {
        self.states_guard().get(&kind).map_or(0, |s| s.generation)
    }

    /// Fetch and replace. Caller must hold the kind's refetch lock.
    async fn refetch(&self, kind: EntityKind) -> Result<Vec<CatalogEntry>> {
        {
            let mut states = self.states_guard();
            if let Some(state) = states.get_mut(&kind) {
                state.refetching = true;
            }
        }
        // The caller's future can be dropped at the await below (the
        // orchestrator primes under a deadline). The guard clears the
        // in-flight flag and flushes queued events so `apply` never stays
        // muted past the fetch.
        let mut flag = RefetchFlag {
            cache: self,
            kind,
            armed: true,
        };

        let fetched = self
            .backend
            .list_active(kind, &ListQuery::default())
            .await;
        flag.armed = false;

        let (snapshot, result) = {
            let mut states = self.states_guard();
            let Some(state) = states.get_mut(&kind) else {
                return Err(SyncError::Internal(format!("no cache state for {kind}")));
            };
            state.refetching = false;
            let queued: Vec<ChangeEvent> = state.pending_events.drain(..).collect();

            match fetched {
                Ok(page) => {
                    let mut items: Vec<CatalogEntry> =
                        page.items.into_iter().filter(CatalogEntry::is_active).collect();
                    items.sort_by(CatalogEntry::catalog_ordering);
                    state.items = items;
                    state.last_fetch_at = Some(Instant::now());
                    state.generation += 1;
                    // Events delivered mid-refetch win over the snapshot.
                    for event in &queued {
                        apply_to_items(&mut state.items, event);
                    }
                    (Some(state.items.clone()), Ok(state.items.clone()))
                }
                Err(err) => {
                    warn!(kind = %kind, error = %err, "catalog refetch failed, keeping previous snapshot");
                    // Queued events still apply to the retained snapshot.
                    for event in &queued {
                        apply_to_items(&mut state.items, event);
                    }
                    let snapshot = (!queued.is_empty()).then(|| state.items.clone());
                    (
                        snapshot,
                        Err(SyncError::FetchFailed(err.detail().to_owned())),
                    )
                }
            }
        };

        if let Some(snapshot) = snapshot {
            self.notify(kind, &snapshot);
        }
        result
    }

    fn notify(&self, kind: EntityKind, snapshot: &[CatalogEntry]) {
        let listeners: Vec<ContentListener> = self
            .listeners_guard()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| Arc::clone(&e.listener))
            .collect();
        for listener in listeners {
            invoke_listener(&listener, snapshot);
        }
    }

    fn states_guard(&self) -> MutexGuard<'_, HashMap<EntityKind, KindState>> {
        self.states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn listeners_guard(&self) -> MutexGuard<'_, Vec<ListenerEntry>> {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Clears `refetching` when a refetch future is dropped mid-flight.
///
/// Disarmed on the normal path, where [`ContentCache::refetch`] clears the
/// flag itself while folding in the fetch result.
struct RefetchFlag<'a> {
    cache: &'a ContentCache,
    kind: EntityKind,
    armed: bool,
}

impl Drop for RefetchFlag<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let snapshot = {
            let mut states = self.cache.states_guard();
            let Some(state) = states.get_mut(&self.kind) else {
                return;
            };
            state.refetching = false;
            let queued: Vec<ChangeEvent> = state.pending_events.drain(..).collect();
            if queued.is_empty() {
                return;
            }
            for event in &queued {
                apply_to_items(&mut state.items, event);
            }
            state.items.clone()
        };
        debug!(kind = %self.kind, "refetch cancelled, flushed queued events");
        self.cache.notify(self.kind, &snapshot);
    }
}

/// Invoke a listener, isolating panics so one bad subscriber cannot take
/// down delivery to the rest.
fn invoke_listener(listener: &ContentListener, snapshot: &[CatalogEntry]) {
    if catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
        error!("content listener panicked; continuing with remaining listeners");
    }
}

/// Apply one event to a sorted, active-only item list.
fn apply_to_items(items: &mut Vec<CatalogEntry>, event: &ChangeEvent) {
    match event.kind {
        ChangeKind::Insert | ChangeKind::Update => {
            items.retain(|item| item.id() != event.id);
            if let Some(after) = &event.after
                && after.is_active()
            {
                items.push(after.clone());
                items.sort_by(CatalogEntry::catalog_ordering);
            }
        }
        ChangeKind::Delete => {
            items.retain(|item| item.id() != event.id);
        }
    }
}
