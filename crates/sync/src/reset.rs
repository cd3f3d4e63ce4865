//! Reset categories and the legacy key migration pass.
//!
//! Resets are category-scoped so "clear my data" never silently grows or
//! shrinks in meaning. Every reset writes a timestamped audit entry so a
//! support thread can reconstruct what was wiped and when.
//!
//! Migration retires the pre-scoping key scheme: unscoped keys are moved
//! under the active identity once and removed. An existing scoped value
//! always wins over a legacy one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::cache::ContentCache;
use crate::collections::UserCollections;
use crate::error::Result;
use crate::store::{KeyValueStore, ScopedKeys, keys::reset_log_key};

/// What a reset clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetCategory {
    /// Every category below, plus the content cache.
    All,
    /// App settings back to defaults.
    SettingsOnly,
    /// Language preference back to the default.
    LanguageOnly,
    /// Content cache freshness only; no user data is touched.
    CacheOnly,
    /// Settings and language together.
    Preferences,
    /// Favorites, reviews, email history, and support history.
    UserData,
    /// Analytics off, location off, email history cleared.
    Privacy,
}

impl ResetCategory {
    pub const ALL_CATEGORIES: [Self; 7] = [
        Self::All,
        Self::SettingsOnly,
        Self::LanguageOnly,
        Self::CacheOnly,
        Self::Preferences,
        Self::UserData,
        Self::Privacy,
    ];

    /// Stable name used in audit entries and the CLI.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::SettingsOnly => "settings_only",
            Self::LanguageOnly => "language_only",
            Self::CacheOnly => "cache_only",
            Self::Preferences => "preferences",
            Self::UserData => "user_data",
            Self::Privacy => "privacy",
        }
    }
}

impl std::fmt::Display for ResetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for ResetCategory {
    type Err = crate::SyncError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL_CATEGORIES
            .iter()
            .copied()
            .find(|c| c.label() == s)
            .ok_or_else(|| crate::SyncError::Validation(format!("unknown reset category: {s}")))
    }
}

/// Audit record written after each reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetAuditEntry {
    pub category: ResetCategory,
    pub at: DateTime<Utc>,
}

/// Outcome of one migration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Legacy keys whose values were moved to their scoped key.
    pub moved: Vec<String>,
    /// Legacy keys removed without moving because the scoped key already
    /// had a value.
    pub superseded: Vec<String>,
}

impl MigrationReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.moved.is_empty() && self.superseded.is_empty()
    }
}

/// Applies resets and the legacy key migration.
pub struct ResetService {
    store: Arc<dyn KeyValueStore>,
    collections: Arc<UserCollections>,
    cache: Arc<ContentCache>,
}

impl ResetService {
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        collections: Arc<UserCollections>,
        cache: Arc<ContentCache>,
    ) -> Self {
        Self {
            store,
            collections,
            cache,
        }
    }

    /// Apply a reset and write its audit entry.
    ///
    /// # Errors
    ///
    /// Returns the first storage error; the audit entry is only written
    /// after the reset succeeds.
    #[instrument(skip(self))]
    pub async fn reset(&self, category: ResetCategory) -> Result<ResetAuditEntry> {
        match category {
            ResetCategory::All => {
                self.collections.reset_all().await?;
                self.collections.email_history().clear().await?;
                self.cache.invalidate(None);
            }
            ResetCategory::SettingsOnly => {
                self.collections.settings().clear().await?;
            }
            ResetCategory::LanguageOnly => {
                self.collections.language().clear().await?;
            }
            ResetCategory::CacheOnly => {
                self.cache.invalidate(None);
            }
            ResetCategory::Preferences => {
                self.collections.settings().clear().await?;
                self.collections.language().clear().await?;
            }
            ResetCategory::UserData => {
                self.collections.favorites().clear().await?;
                self.collections.reviews().clear().await?;
                self.collections.email_history().clear().await?;
                self.collections.support().clear().await?;
            }
            ResetCategory::Privacy => {
                self.collections
                    .settings()
                    .set(sugbo_core::SettingKey::Analytics, false)
                    .await?;
                self.collections
                    .settings()
                    .set(sugbo_core::SettingKey::LocationServices, false)
                    .await?;
                self.collections.email_history().clear().await?;
            }
        }

        let entry = ResetAuditEntry {
            category,
            at: Utc::now(),
        };
        let key = reset_log_key(entry.at.timestamp_millis());
        self.store.set(&key, &serde_json::to_string(&entry)?).await?;
        info!(category = %category, "reset applied");
        Ok(entry)
    }

    /// Move legacy unscoped keys under the given identity scope.
    ///
    /// Idempotent: a second pass finds no legacy keys and reports a no-op.
    #[instrument(skip(self))]
    pub async fn migrate(&self, scope: &str) -> Result<MigrationReport> {
        let keys = ScopedKeys::for_identity(scope);
        let mut report = MigrationReport::default();

        for (legacy, scoped) in keys.migration_pairs() {
            let Some(value) = self.store.get(legacy).await? else {
                continue;
            };
            if self.store.get(&scoped).await?.is_none() {
                self.store.set(&scoped, &value).await?;
                report.moved.push(legacy.to_owned());
            } else {
                report.superseded.push(legacy.to_owned());
            }
            self.store.remove(legacy).await?;
        }

        if !report.is_noop() {
            info!(
                scope,
                moved = report.moved.len(),
                superseded = report.superseded.len(),
                "legacy keys migrated"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::capability::GrantAllCapabilities;
    use crate::remote::MemoryCatalogBackend;
    use crate::store::MemoryStore;
    use crate::store::keys::{EMAIL_HISTORY_KEY, LEGACY_FAVORITES_KEY, LEGACY_LANGUAGE_KEY};
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        collections: Arc<UserCollections>,
        service: ResetService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let collections = Arc::new(UserCollections::new(
            Arc::clone(&store) as _,
            Arc::new(GrantAllCapabilities::default()),
            "u-1",
        ));
        let cache = Arc::new(ContentCache::new(
            Arc::new(MemoryCatalogBackend::new()),
            Duration::from_secs(60),
        ));
        let service = ResetService::new(
            Arc::clone(&store) as _,
            Arc::clone(&collections),
            cache,
        );
        Fixture {
            store,
            collections,
            service,
        }
    }

    #[tokio::test]
    async fn test_preferences_reset_leaves_user_data() {
        let f = fixture();
        f.collections.language().set("ceb").await.unwrap();
        f.collections
            .settings()
            .set(sugbo_core::SettingKey::DarkMode, true)
            .await
            .unwrap();
        f.collections.support().record("s", "m").await.unwrap();

        f.service.reset(ResetCategory::Preferences).await.unwrap();

        assert_eq!(
            f.collections.language().current().await,
            sugbo_core::LanguageTag::En
        );
        assert!(!f.collections.settings().get(sugbo_core::SettingKey::DarkMode).await);
        assert_eq!(f.collections.support().list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_privacy_reset() {
        let f = fixture();
        f.collections.email_history().record("a@b.ph").await.unwrap();
        assert!(f.collections.settings().get(sugbo_core::SettingKey::Analytics).await);

        f.service.reset(ResetCategory::Privacy).await.unwrap();

        assert!(!f.collections.settings().get(sugbo_core::SettingKey::Analytics).await);
        assert!(f.collections.email_history().list().await.is_empty());
    }

    #[tokio::test]
    async fn test_reset_writes_audit_entry() {
        let f = fixture();
        f.service.reset(ResetCategory::CacheOnly).await.unwrap();

        let keys = f.store.list_keys().await.unwrap();
        let audit_key = keys
            .iter()
            .find(|k| k.starts_with("@tourist_app_reset_log_"))
            .expect("audit entry written");
        let raw = f.store.get(audit_key).await.unwrap().unwrap();
        let entry: ResetAuditEntry = serde_json::from_str(&raw).unwrap();
        assert_eq!(entry.category, ResetCategory::CacheOnly);
    }

    #[tokio::test]
    async fn test_user_data_reset_clears_shared_email_history() {
        let f = fixture();
        f.collections.email_history().record("a@b.ph").await.unwrap();
        f.service.reset(ResetCategory::UserData).await.unwrap();
        assert!(f.store.get(EMAIL_HISTORY_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_migrate_moves_and_retires_legacy_keys() {
        let f = fixture();
        f.store.set(LEGACY_LANGUAGE_KEY, "ceb").await.unwrap();
        f.store.set(LEGACY_FAVORITES_KEY, "[]").await.unwrap();

        let report = f.service.migrate("u-1").await.unwrap();
        assert_eq!(report.moved.len(), 2);

        assert_eq!(
            f.store.get("@tourist_app_language_u-1").await.unwrap().as_deref(),
            Some("ceb")
        );
        assert!(f.store.get(LEGACY_LANGUAGE_KEY).await.unwrap().is_none());

        // Second pass is a no-op.
        let report = f.service.migrate("u-1").await.unwrap();
        assert!(report.is_noop());
    }

    #[tokio::test]
    async fn test_migrate_never_overwrites_scoped_value() {
        let f = fixture();
        f.store.set(LEGACY_LANGUAGE_KEY, "ceb").await.unwrap();
        f.store
            .set("@tourist_app_language_u-1", "ja")
            .await
            .unwrap();

        let report = f.service.migrate("u-1").await.unwrap();
        assert_eq!(report.superseded, vec![LEGACY_LANGUAGE_KEY.to_owned()]);
        assert_eq!(
            f.store.get("@tourist_app_language_u-1").await.unwrap().as_deref(),
            Some("ja"),
            "scoped value wins"
        );
        assert!(f.store.get(LEGACY_LANGUAGE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_category_labels_roundtrip() {
        for category in ResetCategory::ALL_CATEGORIES {
            let parsed: ResetCategory = category.label().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert!("everything".parse::<ResetCategory>().is_err());
    }
}
