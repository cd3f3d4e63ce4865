//! CLI command implementations.

pub mod migrate;
pub mod reset;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use sugbo_sync::app::AppCoreBuilder;
use sugbo_sync::capability::DenyAllCapabilities;
use sugbo_sync::identity::StaticAuthProvider;
use sugbo_sync::realtime::PollingChangeStream;
use sugbo_sync::remote::RestCatalogClient;
use sugbo_sync::store::FileStore;
use sugbo_sync::{AppCore, SyncConfig};

/// Interval for the REST polling change stream.
const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Build an [`AppCore`] over the configured backend and on-disk store.
///
/// The CLI runs headless: no platform capabilities and no interactive
/// session, so it wires the deny-all capability provider and an empty
/// auth provider (all local work happens under an explicit scope).
pub async fn build_core() -> Result<AppCore, Box<dyn std::error::Error>> {
    let config = SyncConfig::from_env()?;
    let store = Arc::new(FileStore::open(config.data_dir.clone()).await?);
    let backend = Arc::new(RestCatalogClient::new(&config)?);
    let stream = Arc::new(PollingChangeStream::new(
        Arc::clone(&backend) as _,
        POLL_INTERVAL,
    ));

    Ok(AppCoreBuilder::new(
        store,
        Arc::new(StaticAuthProvider::new()),
        backend,
        stream,
        Arc::new(DenyAllCapabilities),
    )
    .timings_from(&config)
    .build())
}
