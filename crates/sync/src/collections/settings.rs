//! Persisted app settings with capability gating.
//!
//! Enabling notifications or location services first asks the platform for
//! the matching capability. A refusal leaves the stored value untouched and
//! surfaces as `PermissionDenied`, so the persisted state never claims a
//! grant the user did not make.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use sugbo_core::{SettingKey, Settings};

use crate::capability::DeviceCapabilities;
use crate::error::{Result, SyncError};
use crate::store::{KeyValueStore, ScopedKeys};

use super::{load_or_default, save_json};

struct State {
    keys: ScopedKeys,
    settings: Settings,
}

pub struct SettingsCollection {
    store: Arc<dyn KeyValueStore>,
    capabilities: Arc<dyn DeviceCapabilities>,
    state: Mutex<State>,
}

impl SettingsCollection {
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        capabilities: Arc<dyn DeviceCapabilities>,
        scope: &str,
    ) -> Self {
        Self {
            store,
            capabilities,
            state: Mutex::new(State {
                keys: ScopedKeys::for_identity(scope),
                settings: Settings::default(),
            }),
        }
    }

    pub async fn set_scope(&self, scope: &str) {
        let mut state = self.state.lock().await;
        state.keys = ScopedKeys::for_identity(scope);
        state.settings = Settings::default();
    }

    pub async fn load(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.settings = load_or_default(self.store.as_ref(), &state.keys.settings()).await?;
        Ok(())
    }

    /// The current settings snapshot.
    pub async fn current(&self) -> Settings {
        self.state.lock().await.settings.clone()
    }

    /// Read one toggle.
    pub async fn get(&self, key: SettingKey) -> bool {
        self.state.lock().await.settings.get(key)
    }

    /// Flip one toggle and persist.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` when the flip would enable a
    /// capability-gated toggle and the platform refuses the grant; the
    /// stored value is unchanged.
    pub async fn toggle(&self, key: SettingKey) -> Result<Settings> {
        let target = !self.get(key).await;
        self.set(key, target).await
    }

    /// Set one toggle to an explicit value and persist.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` when enabling a capability-gated toggle
    /// and the platform refuses the grant; the stored value is unchanged.
    pub async fn set(&self, key: SettingKey, value: bool) -> Result<Settings> {
        if value {
            let decision = match key {
                SettingKey::Notifications => {
                    Some(self.capabilities.request_notification_permission().await)
                }
                SettingKey::LocationServices => {
                    Some(self.capabilities.request_location_permission().await)
                }
                _ => None,
            };
            if decision.is_some_and(|d| !d.granted) {
                return Err(SyncError::PermissionDenied(format!(
                    "platform refused the capability for {key:?}"
                )));
            }
        }

        let mut state = self.state.lock().await;
        state.settings.set(key, value);
        save_json(self.store.as_ref(), &state.keys.settings(), &state.settings).await?;
        let settings = state.settings.clone();
        drop(state);

        if key == SettingKey::Notifications && !value {
            // Turning notifications off retires anything already scheduled.
            if let Err(err) = self.capabilities.cancel_scheduled_notifications().await {
                warn!(error = %err, "failed to cancel scheduled notifications");
            }
        }
        Ok(settings)
    }

    /// Export the settings as a JSON object.
    pub async fn export(&self) -> serde_json::Value {
        self.state.lock().await.settings.export()
    }

    /// Import settings from a JSON object and persist.
    ///
    /// Capability-gated toggles are only honored when the matching
    /// capability is already granted; no prompt is shown during import.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the payload is not a settings object.
    pub async fn import(&self, value: &serde_json::Value) -> Result<Settings> {
        let mut imported = Settings::import(value)?;

        if imported.notifications
            && !self.capabilities.notification_permission().await.granted
        {
            imported.notifications = false;
        }
        if imported.location_services
            && !self.capabilities.location_permission().await.granted
        {
            imported.location_services = false;
        }

        let mut state = self.state.lock().await;
        state.settings = imported.clone();
        save_json(self.store.as_ref(), &state.keys.settings(), &state.settings).await?;
        Ok(imported)
    }

    /// Drop persisted settings and return to defaults.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.settings = Settings::default();
        self.store.remove(&state.keys.settings()).await
    }
}
