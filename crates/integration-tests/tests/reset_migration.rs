//! Category resets and the legacy key migration, end to end.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use sugbo_core::{DestinationId, SettingKey};
use sugbo_integration_tests::{TestHarness, destination_row};
use sugbo_sync::ResetCategory;
use sugbo_sync::store::KeyValueStore;
use sugbo_sync::store::keys::{LEGACY_FAVORITES_KEY, LEGACY_LANGUAGE_KEY};

#[tokio::test]
async fn test_user_data_reset_spares_preferences() {
    let h = TestHarness::new();
    h.core.initialize().await.unwrap();

    h.core
        .user()
        .favorites()
        .add(&destination_row("kawasan", false, 100))
        .await
        .unwrap();
    h.core
        .user()
        .reviews()
        .write(&DestinationId::new("kawasan"), 4, None)
        .await
        .unwrap();
    h.core.user().language().set("fil").await.unwrap();

    h.core.reset(ResetCategory::UserData).await.unwrap();

    assert!(h.core.user().favorites().list().await.is_empty());
    assert!(h.core.user().reviews().list().await.is_empty());
    assert_eq!(
        h.core.user().language().current().await,
        sugbo_core::LanguageTag::Fil,
        "preferences untouched"
    );
}

#[tokio::test]
async fn test_full_reset_leaves_no_user_keys() {
    let h = TestHarness::new();
    h.core.initialize().await.unwrap();

    h.core
        .user()
        .favorites()
        .add(&destination_row("kawasan", false, 100))
        .await
        .unwrap();
    h.core.user().email_history().record("ana@example.com").await.unwrap();
    h.core
        .user()
        .settings()
        .set(SettingKey::DarkMode, true)
        .await
        .unwrap();

    h.core.reset(ResetCategory::All).await.unwrap();

    let keys = h.store.list_keys().await.unwrap();
    let user_keys: Vec<&String> = keys
        .iter()
        .filter(|k| !k.starts_with("@tourist_app_reset_log_"))
        .collect();
    assert!(user_keys.is_empty(), "only audit entries remain: {user_keys:?}");
}

#[tokio::test]
async fn test_each_reset_appends_an_audit_entry() {
    let h = TestHarness::new();
    h.core.initialize().await.unwrap();

    h.core.reset(ResetCategory::CacheOnly).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    h.core.reset(ResetCategory::Privacy).await.unwrap();

    let keys = h.store.list_keys().await.unwrap();
    let audits = keys
        .iter()
        .filter(|k| k.starts_with("@tourist_app_reset_log_"))
        .count();
    assert_eq!(audits, 2);
}

#[tokio::test]
async fn test_startup_migration_is_idempotent() {
    let h = TestHarness::new();

    // A device from before identity scoping.
    h.store.set(LEGACY_LANGUAGE_KEY, "ceb").await.unwrap();
    h.store.set(LEGACY_FAVORITES_KEY, "[]").await.unwrap();

    h.core.initialize().await.unwrap();

    // The migrated language is live without any user action.
    assert_eq!(
        h.core.user().language().current().await,
        sugbo_core::LanguageTag::Ceb
    );
    assert!(h.store.get(LEGACY_LANGUAGE_KEY).await.unwrap().is_none());

    // Running the migration again finds nothing.
    let report = h.core.migrate().await.unwrap();
    assert!(report.is_noop());
}

#[tokio::test]
async fn test_migration_on_disk_store() {
    use sugbo_sync::store::FileStore;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    store.set(LEGACY_LANGUAGE_KEY, "ja").await.unwrap();

    // Wire a harness-equivalent core over the disk store.
    let backend = Arc::new(sugbo_sync::remote::MemoryCatalogBackend::new());
    let stream = Arc::new(sugbo_sync::realtime::LocalChangeStream::new());
    let core = sugbo_sync::app::AppCoreBuilder::new(
        Arc::clone(&store) as _,
        Arc::new(sugbo_sync::identity::StaticAuthProvider::new()),
        backend,
        stream,
        Arc::new(sugbo_sync::capability::GrantAllCapabilities::default()),
    )
    .build();

    core.initialize().await.unwrap();
    assert_eq!(
        core.user().language().current().await,
        sugbo_core::LanguageTag::Ja
    );

    // The scoped key is on disk; a second store over the same directory
    // sees it.
    let reopened = FileStore::open(dir.path()).await.unwrap();
    assert_eq!(
        reopened
            .get("@tourist_app_language_guest")
            .await
            .unwrap()
            .as_deref(),
        Some("ja")
    );
}
