//! Realtime change subscriptions for the shared catalog.
//!
//! One channel per catalog kind. Each channel runs as its own task: open
//! the stream, feed every event into the cache first, then fan out to
//! registered listeners with the post-apply snapshot. On a drop the task
//! reconnects with exponential backoff and re-baselines the cache, since
//! events may have been missed while disconnected.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sugbo_core::{CatalogEntry, ChangeEvent, ChangeKind, EntityKind};

use crate::cache::ContentCache;
use crate::error::{Result, SyncError};

const EVENT_BUFFER: usize = 64;
const BACKOFF_BASE_SECS: u64 = 1;
const BACKOFF_CAP_SECS: u64 = 30;
const BACKOFF_JITTER_MS: u64 = 250;

/// Listener invoked with each surfaced event and the post-apply snapshot.
pub type EventListener = Arc<dyn Fn(&ChangeEvent, &[CatalogEntry]) + Send + Sync>;

/// Handle returned by [`RealtimeManager::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventSubscription(u64);

/// Lifecycle of one per-kind channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelStatus {
    #[default]
    Idle,
    Connecting,
    Subscribed,
    Error,
    Closed,
}

/// A source of row change events for one catalog kind.
///
/// The receiver closing means the stream dropped; the caller owns the
/// reconnect policy.
#[async_trait]
pub trait ChangeStream: Send + Sync {
    /// Open a stream of change events for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `Network` when the stream cannot be established.
    async fn open(&self, kind: EntityKind) -> Result<mpsc::Receiver<ChangeEvent>>;
}

// =============================================================================
// LocalChangeStream
// =============================================================================

/// In-process change stream for tests and offline development.
///
/// Events pushed with [`publish`](Self::publish) fan out to every open
/// receiver of the matching kind. Dropping connectivity is simulated with
/// [`set_connectable`](Self::set_connectable) and
/// [`disconnect_all`](Self::disconnect_all).
#[derive(Default)]
pub struct LocalChangeStream {
    senders: Mutex<HashMap<EntityKind, Vec<mpsc::Sender<ChangeEvent>>>>,
    connectable: AtomicBool,
}

impl LocalChangeStream {
    #[must_use]
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
            connectable: AtomicBool::new(true),
        }
    }

    /// Allow or refuse new `open` calls.
    pub fn set_connectable(&self, connectable: bool) {
        self.connectable.store(connectable, Ordering::SeqCst);
    }

    /// Deliver an event to every open receiver of its kind.
    pub fn publish(&self, event: &ChangeEvent) {
        let mut senders = self.senders_guard();
        if let Some(list) = senders.get_mut(&event.entity) {
            list.retain(|tx| tx.try_send(event.clone()).is_ok());
        }
    }

    /// Close every open receiver, for one kind or all.
    pub fn disconnect_all(&self, kind: Option<EntityKind>) {
        let mut senders = self.senders_guard();
        match kind {
            Some(kind) => {
                senders.remove(&kind);
            }
            None => senders.clear(),
        }
    }

    fn senders_guard(&self) -> MutexGuard<'_, HashMap<EntityKind, Vec<mpsc::Sender<ChangeEvent>>>> {
        self.senders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl ChangeStream for LocalChangeStream {
    async fn open(&self, kind: EntityKind) -> Result<mpsc::Receiver<ChangeEvent>> {
        if !self.connectable.load(Ordering::SeqCst) {
            return Err(SyncError::Network(format!(
                "change stream for {kind} refused connection"
            )));
        }
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        self.senders_guard().entry(kind).or_default().push(tx);
        Ok(rx)
    }
}

// =============================================================================
// PollingChangeStream
// =============================================================================

/// Change stream synthesized by polling the backend and diffing rows.
///
/// Used where no push transport is available. Each `open` seeds a baseline
/// with one list call, then emits insert/update/delete events from
/// successive diffs keyed by row id and `updated_at`. A failed poll closes
/// the channel so the owner's reconnect policy takes over.
pub struct PollingChangeStream {
    backend: Arc<dyn crate::remote::CatalogBackend>,
    interval: Duration,
}

impl PollingChangeStream {
    #[must_use]
    pub fn new(backend: Arc<dyn crate::remote::CatalogBackend>, interval: Duration) -> Self {
        Self { backend, interval }
    }
}

#[async_trait]
impl ChangeStream for PollingChangeStream {
    async fn open(&self, kind: EntityKind) -> Result<mpsc::Receiver<ChangeEvent>> {
        let baseline = self
            .backend
            .list_active(kind, &crate::remote::ListQuery::default())
            .await?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let backend = Arc::clone(&self.backend);
        let interval = self.interval;
        tokio::spawn(async move {
            let mut previous = baseline.items;
            loop {
                tokio::time::sleep(interval).await;
                let current = match backend
                    .list_active(kind, &crate::remote::ListQuery::default())
                    .await
                {
                    Ok(page) => page.items,
                    Err(err) => {
                        debug!(kind = %kind, error = %err, "poll failed, closing stream");
                        return;
                    }
                };
                for event in diff_rows(kind, &previous, &current) {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                previous = current;
            }
        });
        Ok(rx)
    }
}

/// Events that transform `previous` into `current`.
fn diff_rows(
    kind: EntityKind,
    previous: &[CatalogEntry],
    current: &[CatalogEntry],
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    for entry in current {
        match previous.iter().find(|p| p.id() == entry.id()) {
            None => events.push(ChangeEvent::insert(entry.clone())),
            Some(old) if old != entry => {
                events.push(ChangeEvent::update(Some(old.clone()), entry.clone()));
            }
            Some(_) => {}
        }
    }
    for old in previous {
        if !current.iter().any(|c| c.id() == old.id()) {
            events.push(ChangeEvent::delete(kind, old.id(), Some(old.clone())));
        }
    }
    events
}

// =============================================================================
// RealtimeManager
// =============================================================================

struct ListenerEntry {
    id: u64,
    kind: EntityKind,
    listener: EventListener,
}

struct ManagerInner {
    stream: Arc<dyn ChangeStream>,
    cache: Arc<ContentCache>,
    statuses: Mutex<HashMap<EntityKind, ChannelStatus>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_handle: AtomicU64,
}

impl ManagerInner {
    fn set_status(&self, kind: EntityKind, status: ChannelStatus) {
        self.statuses_guard().insert(kind, status);
    }

    fn statuses_guard(&self) -> MutexGuard<'_, HashMap<EntityKind, ChannelStatus>> {
        self.statuses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn listeners_guard(&self) -> MutexGuard<'_, Vec<ListenerEntry>> {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn fan_out(&self, event: &ChangeEvent, snapshot: &[CatalogEntry]) {
        let listeners: Vec<EventListener> = self
            .listeners_guard()
            .iter()
            .filter(|e| e.kind == event.entity)
            .map(|e| Arc::clone(&e.listener))
            .collect();
        for listener in listeners {
            listener(event, snapshot);
        }
    }
}

/// Owns one subscription task per catalog kind and routes their events
/// through the cache before any listener sees them.
pub struct RealtimeManager {
    inner: Arc<ManagerInner>,
    tasks: Mutex<HashMap<EntityKind, JoinHandle<()>>>,
}

impl RealtimeManager {
    #[must_use]
    pub fn new(stream: Arc<dyn ChangeStream>, cache: Arc<ContentCache>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                stream,
                cache,
                statuses: Mutex::new(HashMap::new()),
                listeners: Mutex::new(Vec::new()),
                next_handle: AtomicU64::new(1),
            }),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Start the channels for the given kinds. Idempotent: a kind whose
    /// channel task is still running is left alone, so repeated starts
    /// never open a gap in event delivery.
    pub fn start(&self, kinds: &[EntityKind]) {
        let mut tasks = self.tasks_guard();
        for &kind in kinds {
            if let Some(task) = tasks.get(&kind)
                && !task.is_finished()
            {
                continue;
            }
            let inner = Arc::clone(&self.inner);
            tasks.insert(kind, tokio::spawn(run_channel(inner, kind)));
        }
    }

    /// Stop every channel. Listeners stay registered.
    pub fn stop(&self) {
        let mut tasks = self.tasks_guard();
        for (kind, task) in tasks.drain() {
            task.abort();
            self.inner.set_status(kind, ChannelStatus::Closed);
        }
    }

    /// Register an event listener for one kind.
    pub fn on(
        &self,
        kind: EntityKind,
        listener: impl Fn(&ChangeEvent, &[CatalogEntry]) + Send + Sync + 'static,
    ) -> EventSubscription {
        let id = self.inner.next_handle.fetch_add(1, Ordering::SeqCst);
        self.inner.listeners_guard().push(ListenerEntry {
            id,
            kind,
            listener: Arc::new(listener),
        });
        EventSubscription(id)
    }

    /// Remove an event listener.
    pub fn off(&self, subscription: EventSubscription) {
        self.inner
            .listeners_guard()
            .retain(|e| e.id != subscription.0);
    }

    /// Current status of one channel.
    #[must_use]
    pub fn status(&self, kind: EntityKind) -> ChannelStatus {
        self.inner
            .statuses_guard()
            .get(&kind)
            .copied()
            .unwrap_or_default()
    }

    fn tasks_guard(&self) -> MutexGuard<'_, HashMap<EntityKind, JoinHandle<()>>> {
        self.tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for RealtimeManager {
    fn drop(&mut self) {
        for (_, task) in self.tasks_guard().drain() {
            task.abort();
        }
    }
}

async fn run_channel(inner: Arc<ManagerInner>, kind: EntityKind) {
    let mut attempt: u32 = 0;
    let mut had_session = false;
    loop {
        inner.set_status(kind, ChannelStatus::Connecting);
        match inner.stream.open(kind).await {
            Ok(mut rx) => {
                attempt = 0;
                inner.set_status(kind, ChannelStatus::Subscribed);
                info!(kind = %kind, "realtime channel subscribed");

                if had_session {
                    // Events may have been missed while disconnected;
                    // re-baseline before trusting the stream again.
                    inner.cache.invalidate(Some(kind));
                    if let Err(err) = inner.cache.get(kind, false).await {
                        warn!(kind = %kind, error = %err, "re-baseline fetch failed after reconnect");
                    }
                }
                had_session = true;

                while let Some(event) = rx.recv().await {
                    inner.cache.apply(&event);
                    let snapshot = inner.cache.snapshot(kind);
                    let surfaced = surface_event(event);
                    inner.fan_out(&surfaced, &snapshot);
                }
                debug!(kind = %kind, "realtime channel closed");
            }
            Err(err) => {
                warn!(kind = %kind, error = %err, "realtime channel failed to open");
            }
        }

        inner.set_status(kind, ChannelStatus::Error);
        attempt = attempt.saturating_add(1);
        tokio::time::sleep(backoff_delay(attempt)).await;
    }
}

/// Shape events for listeners: an update that flips a row inactive reads
/// as a delete, matching what subscribers observe in the snapshot.
fn surface_event(event: ChangeEvent) -> ChangeEvent {
    let deactivated = event.kind == ChangeKind::Update
        && event.after.as_ref().is_some_and(|after| !after.is_active());
    if deactivated {
        ChangeEvent {
            kind: ChangeKind::Delete,
            entity: event.entity,
            id: event.id,
            before: event.after,
            after: None,
        }
    } else {
        event
    }
}

/// Exponential backoff, base 1s doubling to a 30s cap, plus jitter.
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_SECS << attempt.min(6).saturating_sub(1);
    let secs = exp.min(BACKOFF_CAP_SECS);
    let jitter = rand::rng().random_range(0..BACKOFF_JITTER_MS);
    Duration::from_secs(secs) + Duration::from_millis(jitter)
}
