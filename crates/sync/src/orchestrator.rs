//! Startup and identity-switch orchestration.
//!
//! Initialization runs a fixed sequence: probe storage, migrate legacy
//! keys, resolve the identity, load the user collections, prime the
//! content cache, start realtime. Only an unusable store is fatal; every
//! other failure degrades and the app starts with what it has.
//!
//! Concurrent `initialize` calls collapse onto one run: later callers wait
//! and observe its outcome instead of re-running the sequence.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, instrument, warn};

use sugbo_core::EntityKind;

use crate::cache::ContentCache;
use crate::collections::UserCollections;
use crate::error::{ErrorKind, Result, SyncError};
use crate::identity::IdentityContext;
use crate::realtime::{ChannelStatus, RealtimeManager};
use crate::reset::ResetService;
use crate::store::KeyValueStore;

/// Lifecycle state of the sync engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Uninitialized,
    Initializing,
    /// Every component came up.
    Ready,
    /// Started, but at least one component is running without its data.
    Degraded,
    /// The local store is unusable; nothing can run.
    Failed,
}

/// Health of one component in a [`HealthReport`].
#[derive(Debug, Clone)]
pub struct ComponentHealth {
    pub name: &'static str,
    pub healthy: bool,
    pub detail: Option<String>,
}

/// Snapshot of engine health. Produced without mutating any state.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub state: EngineState,
    pub components: Vec<ComponentHealth>,
}

impl HealthReport {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.state == EngineState::Ready && self.components.iter().all(|c| c.healthy)
    }
}

/// Drives initialization and re-initialization of every component.
pub struct Orchestrator {
    store: Arc<dyn KeyValueStore>,
    identity: Arc<IdentityContext>,
    collections: Arc<UserCollections>,
    cache: Arc<ContentCache>,
    realtime: Arc<RealtimeManager>,
    reset: Arc<ResetService>,
    init_deadline: Duration,
    state: std::sync::Mutex<EngineState>,
    init_lock: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        identity: Arc<IdentityContext>,
        collections: Arc<UserCollections>,
        cache: Arc<ContentCache>,
        realtime: Arc<RealtimeManager>,
        reset: Arc<ResetService>,
        init_deadline: Duration,
    ) -> Self {
        Self {
            store,
            identity,
            collections,
            cache,
            realtime,
            reset,
            init_deadline,
            state: std::sync::Mutex::new(EngineState::Uninitialized),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Current engine state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Run the full startup sequence.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` when the local store cannot be probed;
    /// every other component failure degrades instead of failing.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<EngineState> {
        let _guard = self.init_lock.lock().await;
        match self.state() {
            EngineState::Ready | EngineState::Degraded => return Ok(self.state()),
            _ => {}
        }
        self.set_state(EngineState::Initializing);

        // An unusable store is the one fatal condition.
        if let Err(err) = self.store.list_keys().await {
            self.set_state(EngineState::Failed);
            return Err(SyncError::StorageUnavailable(err.detail().to_owned()));
        }

        let mut notes = Vec::new();

        // Migrate against the last-known identity before anything reads
        // scoped keys.
        let last_scope = self.identity.current().scope().to_owned();
        if let Err(err) = self.reset.migrate(&last_scope).await {
            notes.push(format!("migration: {err}"));
        }

        if let Err(err) = self.identity.resolve().await {
            if err.kind() == ErrorKind::AuthUnavailable {
                notes.push(format!("identity: {err}"));
            } else {
                notes.push(format!("identity resolve: {err}"));
            }
        }

        self.bring_up_for_current_identity(&mut notes).await;

        let state = if notes.is_empty() {
            EngineState::Ready
        } else {
            warn!(notes = ?notes, "engine started degraded");
            EngineState::Degraded
        };
        self.set_state(state);
        info!(state = ?state, "engine initialized");
        Ok(state)
    }

    /// Re-run the identity-dependent part of startup after a sign-in,
    /// sign-up, or sign-out changed the active identity.
    #[instrument(skip(self))]
    pub async fn initialize_for_user(&self) -> Result<EngineState> {
        let _guard = self.init_lock.lock().await;
        let mut notes = Vec::new();

        self.realtime.stop();
        self.cache.invalidate(None);
        self.bring_up_for_current_identity(&mut notes).await;

        let state = if notes.is_empty() {
            EngineState::Ready
        } else {
            EngineState::Degraded
        };
        self.set_state(state);
        Ok(state)
    }

    /// Tear down and run the full sequence again.
    pub async fn reinitialize(&self) -> Result<EngineState> {
        {
            let _guard = self.init_lock.lock().await;
            self.realtime.stop();
            self.set_state(EngineState::Uninitialized);
        }
        self.initialize().await
    }

    /// Stop background work. The engine can be reinitialized afterwards.
    pub async fn shutdown(&self) {
        let _guard = self.init_lock.lock().await;
        self.realtime.stop();
        self.set_state(EngineState::Uninitialized);
    }

    /// Probe every component without mutating anything.
    pub async fn health_check(&self) -> HealthReport {
        let mut components = Vec::new();

        let storage = self.store.list_keys().await;
        components.push(ComponentHealth {
            name: "storage",
            healthy: storage.is_ok(),
            detail: storage.err().map(|e| e.to_string()),
        });

        let identity = self.identity.current();
        components.push(ComponentHealth {
            name: "identity",
            healthy: true,
            detail: Some(format!("scope {}", identity.scope())),
        });

        for kind in EntityKind::ALL {
            let fresh = self.cache.is_fresh(kind);
            components.push(ComponentHealth {
                name: match kind {
                    EntityKind::Destination => "cache.destinations",
                    EntityKind::Delicacy => "cache.delicacies",
                },
                healthy: fresh,
                detail: (!fresh).then(|| "stale or never fetched".to_owned()),
            });
        }

        for kind in EntityKind::ALL {
            let status = self.realtime.status(kind);
            components.push(ComponentHealth {
                name: match kind {
                    EntityKind::Destination => "realtime.destinations",
                    EntityKind::Delicacy => "realtime.delicacies",
                },
                healthy: status == ChannelStatus::Subscribed,
                detail: (status != ChannelStatus::Subscribed)
                    .then(|| format!("{status:?}")),
            });
        }

        HealthReport {
            state: self.state(),
            components,
        }
    }

    /// Scope collections, load them, prime the cache under the deadline,
    /// and start realtime. Failures append to `notes`.
    async fn bring_up_for_current_identity(&self, notes: &mut Vec<String>) {
        let scope = self.identity.current().scope().to_owned();
        self.collections.set_scope(&scope).await;
        for (name, err) in self.collections.load_all().await {
            notes.push(format!("{name}: {err}"));
        }

        let prime = async {
            for kind in EntityKind::ALL {
                if let Err(err) = self.cache.get(kind, false).await {
                    notes.push(format!("prime {kind}: {err}"));
                }
            }
        };
        if timeout(self.init_deadline, prime).await.is_err() {
            notes.push("prime: deadline exceeded, starting with an empty cache".to_owned());
        }

        self.realtime.start(&EntityKind::ALL);
    }

    fn set_state(&self, state: EngineState) {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = state;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::capability::GrantAllCapabilities;
    use crate::identity::StaticAuthProvider;
    use crate::realtime::LocalChangeStream;
    use crate::remote::MemoryCatalogBackend;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use sugbo_core::{CatalogEntry, Destination, DestinationId, GUEST_SCOPE};

    struct Fixture {
        store: Arc<MemoryStore>,
        backend: Arc<MemoryCatalogBackend>,
        orchestrator: Orchestrator,
    }

    fn destination(id: &str) -> CatalogEntry {
        CatalogEntry::Destination(Destination {
            id: DestinationId::new(id),
            name: format!("dest {id}"),
            location: "Cebu".to_owned(),
            category: "beach".to_owned(),
            description: String::new(),
            coordinates: None,
            images: vec![],
            rating: 4.0,
            review_count: 0,
            featured: false,
            is_active: true,
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
            updated_at: Utc.timestamp_opt(0, 0).unwrap(),
        })
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MemoryCatalogBackend::new());
        let identity = Arc::new(IdentityContext::new(Arc::new(StaticAuthProvider::new())));
        let collections = Arc::new(UserCollections::new(
            Arc::clone(&store) as _,
            Arc::new(GrantAllCapabilities::default()),
            GUEST_SCOPE,
        ));
        let cache = Arc::new(ContentCache::new(
            Arc::clone(&backend) as _,
            Duration::from_secs(60),
        ));
        let realtime = Arc::new(RealtimeManager::new(
            Arc::new(LocalChangeStream::new()),
            Arc::clone(&cache),
        ));
        let reset = Arc::new(ResetService::new(
            Arc::clone(&store) as _,
            Arc::clone(&collections),
            Arc::clone(&cache),
        ));
        let orchestrator = Orchestrator::new(
            Arc::clone(&store) as _,
            identity,
            collections,
            cache,
            realtime,
            reset,
            Duration::from_secs(5),
        );
        Fixture {
            store,
            backend,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn test_clean_start_is_ready() {
        let f = fixture();
        f.backend.insert_row(destination("a"));
        let state = f.orchestrator.initialize().await.unwrap();
        assert_eq!(state, EngineState::Ready);
    }

    #[tokio::test]
    async fn test_unusable_store_fails() {
        let f = fixture();
        f.store.set_available(false);
        let err = f.orchestrator.initialize().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert_eq!(f.orchestrator.state(), EngineState::Failed);
    }

    #[tokio::test]
    async fn test_offline_backend_degrades_not_fails() {
        let f = fixture();
        f.backend.set_offline(true);
        let state = f.orchestrator.initialize().await.unwrap();
        assert_eq!(state, EngineState::Degraded);
    }

    #[tokio::test]
    async fn test_second_initialize_is_a_noop() {
        let f = fixture();
        f.orchestrator.initialize().await.unwrap();
        let state = f.orchestrator.initialize().await.unwrap();
        assert_eq!(state, EngineState::Ready);
    }

    #[tokio::test]
    async fn test_migration_runs_before_collection_load() {
        let f = fixture();
        f.store
            .set(crate::store::keys::LEGACY_LANGUAGE_KEY, "ceb")
            .await
            .unwrap();

        f.orchestrator.initialize().await.unwrap();

        // The migrated value must be visible in the loaded collection.
        assert_eq!(
            f.store
                .get("@tourist_app_language_guest")
                .await
                .unwrap()
                .as_deref(),
            Some("ceb")
        );
    }

    #[tokio::test]
    async fn test_health_report_names_stale_components() {
        let f = fixture();
        let report = f.orchestrator.health_check().await;
        assert_eq!(report.state, EngineState::Uninitialized);
        assert!(!report.is_healthy());
        assert!(
            report
                .components
                .iter()
                .any(|c| c.name == "cache.destinations" && !c.healthy)
        );

        f.orchestrator.initialize().await.unwrap();
        let report = f.orchestrator.health_check().await;
        assert_eq!(report.state, EngineState::Ready);
        assert!(report.components.iter().any(|c| c.name == "storage" && c.healthy));
    }
}
