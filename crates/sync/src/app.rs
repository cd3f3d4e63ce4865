//! The assembled sync core.
//!
//! [`AppCore`] wires every component together behind one handle: content
//! reads served cache-first, realtime subscriptions, the user collections,
//! auth flows that rescope user data, and category resets. Embedders build
//! one via [`AppCoreBuilder`], injecting the store, auth provider, backend,
//! change stream, and capability provider for their platform.

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use sugbo_core::{CatalogEntry, Email, EntityKind, Identity};

use crate::cache::{ContentCache, ContentSubscription};
use crate::capability::DeviceCapabilities;
use crate::collections::UserCollections;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::identity::{AuthProvider, IdentityContext, SignUpProfile};
use crate::orchestrator::{EngineState, HealthReport, Orchestrator};
use crate::realtime::{ChangeStream, EventSubscription, RealtimeManager};
use crate::remote::{CatalogBackend, ListQuery, Page};
use crate::reset::{MigrationReport, ResetAuditEntry, ResetCategory, ResetService};
use crate::store::KeyValueStore;

const DEFAULT_INIT_DEADLINE: Duration = Duration::from_secs(15);

/// Builder for [`AppCore`]. All five platform seams are required.
pub struct AppCoreBuilder {
    store: Arc<dyn KeyValueStore>,
    auth: Arc<dyn AuthProvider>,
    backend: Arc<dyn CatalogBackend>,
    stream: Arc<dyn ChangeStream>,
    capabilities: Arc<dyn DeviceCapabilities>,
    cache_ttl: Duration,
    init_deadline: Duration,
}

impl AppCoreBuilder {
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        auth: Arc<dyn AuthProvider>,
        backend: Arc<dyn CatalogBackend>,
        stream: Arc<dyn ChangeStream>,
        capabilities: Arc<dyn DeviceCapabilities>,
    ) -> Self {
        Self {
            store,
            auth,
            backend,
            stream,
            capabilities,
            cache_ttl: SyncConfig::DEFAULT_CACHE_TTL,
            init_deadline: DEFAULT_INIT_DEADLINE,
        }
    }

    #[must_use]
    pub const fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn init_deadline(mut self, deadline: Duration) -> Self {
        self.init_deadline = deadline;
        self
    }

    /// Take the TTL and init deadline from a loaded configuration.
    #[must_use]
    pub const fn timings_from(mut self, config: &SyncConfig) -> Self {
        self.cache_ttl = config.cache_ttl;
        self.init_deadline = config.init_deadline;
        self
    }

    #[must_use]
    pub fn build(self) -> AppCore {
        let identity = Arc::new(IdentityContext::new(self.auth));
        let collections = Arc::new(UserCollections::new(
            Arc::clone(&self.store),
            self.capabilities,
            identity.current().scope(),
        ));
        let cache = Arc::new(ContentCache::new(
            Arc::clone(&self.backend),
            self.cache_ttl,
        ));
        let realtime = Arc::new(RealtimeManager::new(self.stream, Arc::clone(&cache)));
        let reset = Arc::new(ResetService::new(
            Arc::clone(&self.store),
            Arc::clone(&collections),
            Arc::clone(&cache),
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&self.store),
            Arc::clone(&identity),
            Arc::clone(&collections),
            Arc::clone(&cache),
            Arc::clone(&realtime),
            Arc::clone(&reset),
            self.init_deadline,
        ));
        AppCore {
            identity,
            collections,
            cache,
            realtime,
            backend: self.backend,
            reset,
            orchestrator,
        }
    }
}

/// One handle over the whole sync core.
pub struct AppCore {
    identity: Arc<IdentityContext>,
    collections: Arc<UserCollections>,
    cache: Arc<ContentCache>,
    realtime: Arc<RealtimeManager>,
    backend: Arc<dyn CatalogBackend>,
    reset: Arc<ResetService>,
    orchestrator: Arc<Orchestrator>,
}

impl AppCore {
    // ===== Lifecycle =====

    /// Run the startup sequence. See [`Orchestrator::initialize`].
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` when the local store is unusable.
    pub async fn initialize(&self) -> Result<EngineState> {
        self.orchestrator.initialize().await
    }

    /// Tear down and start again.
    pub async fn reinitialize(&self) -> Result<EngineState> {
        self.orchestrator.reinitialize().await
    }

    /// Stop background work.
    pub async fn shutdown(&self) {
        self.orchestrator.shutdown().await;
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.orchestrator.state()
    }

    pub async fn health_check(&self) -> HealthReport {
        self.orchestrator.health_check().await
    }

    // ===== Content =====

    /// List catalog content.
    ///
    /// The unfiltered default query is served cache-first; filtered
    /// queries always go to the backend.
    ///
    /// # Errors
    ///
    /// Returns `FetchFailed` or `Network` when the read cannot be served.
    pub async fn content(&self, kind: EntityKind, query: &ListQuery) -> Result<Vec<CatalogEntry>> {
        if query.is_default() {
            return self.cache.get(kind, true).await;
        }
        let page = self.backend.list_active(kind, query).await?;
        Ok(page.items)
    }

    /// List catalog content with paging metadata, bypassing the cache.
    pub async fn content_page(
        &self,
        kind: EntityKind,
        query: &ListQuery,
    ) -> Result<Page<CatalogEntry>> {
        self.backend.list_active(kind, query).await
    }

    /// Fetch one catalog entry by id, active or not.
    pub async fn content_by_id(&self, kind: EntityKind, id: &str) -> Result<CatalogEntry> {
        self.backend.get_by_id(kind, id).await
    }

    /// Subscribe to snapshot updates for one kind. The current snapshot is
    /// delivered synchronously.
    pub fn subscribe_content(
        &self,
        kind: EntityKind,
        listener: impl Fn(&[CatalogEntry]) + Send + Sync + 'static,
    ) -> ContentSubscription {
        self.cache.subscribe(kind, listener)
    }

    pub fn unsubscribe_content(&self, subscription: ContentSubscription) {
        self.cache.unsubscribe(subscription);
    }

    /// Subscribe to individual change events for one kind.
    pub fn on_content_event(
        &self,
        kind: EntityKind,
        listener: impl Fn(&sugbo_core::ChangeEvent, &[CatalogEntry]) + Send + Sync + 'static,
    ) -> EventSubscription {
        self.realtime.on(kind, listener)
    }

    pub fn off_content_event(&self, subscription: EventSubscription) {
        self.realtime.off(subscription);
    }

    // ===== Identity and user data =====

    /// The active identity.
    #[must_use]
    pub fn current_identity(&self) -> Identity {
        self.identity.current()
    }

    /// The identity context, for transition listeners.
    #[must_use]
    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    /// The user-scoped collections for the active identity.
    #[must_use]
    pub fn user(&self) -> &UserCollections {
        &self.collections
    }

    /// Sign in and rescope user data to the signed-in identity.
    ///
    /// The address is recorded in the shared email history before the
    /// provider is consulted, so suggestions work even when the attempt
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a malformed address, `Unauthorized` for
    /// bad credentials, `AuthUnavailable` when the provider is down.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, raw_email: &str, password: &str) -> Result<Identity> {
        let email = self.collections.email_history().record(raw_email).await?;
        let identity = self.identity.sign_in(&email, password).await?;
        self.orchestrator.initialize_for_user().await?;
        Ok(identity)
    }

    /// Register a new account and rescope user data to it.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the address is already registered; the
    /// address still lands in the email history.
    #[instrument(skip_all)]
    pub async fn sign_up(
        &self,
        raw_email: &str,
        password: &str,
        profile: Option<SignUpProfile>,
    ) -> Result<Identity> {
        let email = self.collections.email_history().record(raw_email).await?;
        let identity = self.identity.sign_up(&email, password, profile).await?;
        self.orchestrator.initialize_for_user().await?;
        Ok(identity)
    }

    /// Sign out and rescope user data to the guest identity.
    pub async fn sign_out(&self) -> Result<Identity> {
        let identity = self.identity.sign_out().await?;
        self.orchestrator.initialize_for_user().await?;
        Ok(identity)
    }

    // ===== Reset and migration =====

    /// Apply a category reset. See [`ResetService::reset`].
    pub async fn reset(&self, category: ResetCategory) -> Result<ResetAuditEntry> {
        self.reset.reset(category).await
    }

    /// Run the legacy key migration for the active identity.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        self.reset
            .migrate(self.identity.current().scope())
            .await
    }

    /// Run the legacy key migration for an explicit scope (maintenance
    /// tooling; the app itself migrates via [`Self::migrate`]).
    pub async fn migrate_scope(&self, scope: &str) -> Result<MigrationReport> {
        self.reset.migrate(scope).await
    }

    /// Validate an email address without touching any state.
    ///
    /// # Errors
    ///
    /// Returns `Validation` with the specific defect.
    pub fn validate_email(raw: &str) -> Result<Email> {
        Email::parse(raw).map_err(SyncError::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::capability::GrantAllCapabilities;
    use crate::error::ErrorKind;
    use crate::identity::StaticAuthProvider;
    use crate::realtime::LocalChangeStream;
    use crate::remote::MemoryCatalogBackend;
    use crate::store::MemoryStore;

    fn core_with(auth: Arc<StaticAuthProvider>) -> (AppCore, Arc<MemoryCatalogBackend>) {
        let backend = Arc::new(MemoryCatalogBackend::new());
        let stream = Arc::new(LocalChangeStream::new());
        backend.attach_stream(Arc::clone(&stream));
        let core = AppCoreBuilder::new(
            Arc::new(MemoryStore::new()),
            auth,
            Arc::clone(&backend) as _,
            stream,
            Arc::new(GrantAllCapabilities::default()),
        )
        .build();
        (core, backend)
    }

    #[tokio::test]
    async fn test_sign_in_rescopes_and_records_email() {
        let auth = Arc::new(StaticAuthProvider::new());
        let (core, _) = core_with(Arc::clone(&auth));
        core.initialize().await.unwrap();

        core.sign_up("ana@example.com", "password123", None)
            .await
            .unwrap();
        assert!(!core.current_identity().is_guest());

        let history = core.user().email_history().list().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].email.as_str(), "ana@example.com");
    }

    #[tokio::test]
    async fn test_failed_sign_in_still_records_email() {
        let auth = Arc::new(StaticAuthProvider::new());
        let (core, _) = core_with(auth);
        core.initialize().await.unwrap();

        let err = core
            .sign_in("stranger@example.com", "wrong-password")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(core.current_identity().is_guest());

        let history = core.user().email_history().list().await;
        assert_eq!(history.len(), 1, "address remembered despite the failure");
    }

    #[tokio::test]
    async fn test_guest_data_does_not_leak_into_account() {
        let auth = Arc::new(StaticAuthProvider::new());
        let (core, _) = core_with(auth);
        core.initialize().await.unwrap();

        core.user().support().record("guest question", "body").await.unwrap();
        core.sign_up("ana@example.com", "password123", None).await.unwrap();

        assert!(
            core.user().support().list().await.is_empty(),
            "signed-in scope starts clean"
        );

        core.sign_out().await.unwrap();
        assert_eq!(core.user().support().list().await.len(), 1, "guest data intact");
    }

    #[tokio::test]
    async fn test_malformed_email_rejected_before_provider() {
        let auth = Arc::new(StaticAuthProvider::new());
        auth.set_available(false);
        let (core, _) = core_with(auth);

        // Provider is down, but validation fires first.
        let err = core.sign_in("not-an-email", "pw").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
