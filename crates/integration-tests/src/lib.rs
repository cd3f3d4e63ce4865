//! Integration test harness for the Sugbo Trails sync core.
//!
//! Builds a full [`AppCore`] over in-memory seams: memory key-value store,
//! memory catalog backend wired to a local change stream, static auth
//! provider, and a grant-all capability provider. Tests drive the engine
//! exactly the way an embedding app would, with no network and no disk.
//!
//! Run with: `cargo test -p sugbo-integration-tests`

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use sugbo_core::{CatalogEntry, Delicacy, DelicacyId, Destination, DestinationId};
use sugbo_sync::app::{AppCore, AppCoreBuilder};
use sugbo_sync::capability::{DeviceCapabilities, GrantAllCapabilities};
use sugbo_sync::identity::StaticAuthProvider;
use sugbo_sync::realtime::LocalChangeStream;
use sugbo_sync::remote::MemoryCatalogBackend;
use sugbo_sync::store::MemoryStore;

/// A fully wired engine over in-memory seams.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub backend: Arc<MemoryCatalogBackend>,
    pub stream: Arc<LocalChangeStream>,
    pub auth: Arc<StaticAuthProvider>,
    pub core: AppCore,
}

impl TestHarness {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(Arc::new(GrantAllCapabilities::default()))
    }

    #[must_use]
    pub fn with_capabilities(capabilities: Arc<dyn DeviceCapabilities>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MemoryCatalogBackend::new());
        let stream = Arc::new(LocalChangeStream::new());
        backend.attach_stream(Arc::clone(&stream));
        let auth = Arc::new(StaticAuthProvider::new());

        let core = AppCoreBuilder::new(
            Arc::clone(&store) as _,
            Arc::clone(&auth) as _,
            Arc::clone(&backend) as _,
            Arc::clone(&stream) as _,
            capabilities,
        )
        .cache_ttl(Duration::from_secs(60))
        .init_deadline(Duration::from_secs(5))
        .build();

        Self {
            store,
            backend,
            stream,
            auth,
            core,
        }
    }

    /// Poll until `check` passes or a short deadline expires.
    ///
    /// # Panics
    ///
    /// Panics when the condition is not reached in time.
    pub async fn wait_until(&self, mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

/// A destination row for seeding.
#[must_use]
pub fn destination(id: &str, featured: bool, created_secs: i64) -> CatalogEntry {
    CatalogEntry::Destination(destination_row(id, featured, created_secs))
}

/// The inner destination, for collection APIs that take `&Destination`.
#[must_use]
pub fn destination_row(id: &str, featured: bool, created_secs: i64) -> Destination {
    Destination {
        id: DestinationId::new(id),
        name: format!("Destination {id}"),
        location: "Cebu".to_owned(),
        category: "nature".to_owned(),
        description: "A place worth the trip".to_owned(),
        coordinates: None,
        images: vec![format!("https://img.example/{id}.jpg")],
        rating: 4.2,
        review_count: 12,
        featured,
        is_active: true,
        created_at: timestamp(created_secs),
        updated_at: timestamp(created_secs),
    }
}

/// A delicacy row for seeding.
#[must_use]
pub fn delicacy(id: &str, created_secs: i64) -> CatalogEntry {
    CatalogEntry::Delicacy(Delicacy {
        id: DelicacyId::new(id),
        name: format!("Delicacy {id}"),
        location: "Carcar".to_owned(),
        category: "street-food".to_owned(),
        description: String::new(),
        coordinates: None,
        images: vec![],
        rating: 4.6,
        review_count: 40,
        featured: false,
        is_active: true,
        restaurant: "Carcar Market".to_owned(),
        price_range: "₱100-250".to_owned(),
        ingredients: std::collections::BTreeSet::new(),
        allergens: std::collections::BTreeSet::new(),
        dietary_flags: std::collections::BTreeSet::new(),
        created_at: timestamp(created_secs),
        updated_at: timestamp(created_secs),
    })
}
