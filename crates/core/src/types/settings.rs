//! Typed app settings schema.
//!
//! Settings are a fixed set of boolean toggles. Persisted JSON is clamped
//! to this schema on load and on import: unknown keys are dropped, missing
//! keys take their documented defaults.

use serde::{Deserialize, Serialize};

/// Error for settings import/toggle operations.
#[derive(thiserror::Error, Debug, Clone)]
pub enum SettingsError {
    /// The imported payload is not a settings object.
    #[error("invalid settings payload: {0}")]
    InvalidPayload(String),
}

/// The settings keys the app understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    /// Push notifications. Enabling requires the notification capability.
    Notifications,
    /// Location-aware features. Enabling requires the location capability.
    LocationServices,
    DarkMode,
    DataCompression,
    Analytics,
    OfflineMaps,
}

impl SettingKey {
    /// All keys in the schema.
    pub const ALL: [Self; 6] = [
        Self::Notifications,
        Self::LocationServices,
        Self::DarkMode,
        Self::DataCompression,
        Self::Analytics,
        Self::OfflineMaps,
    ];

    /// Whether enabling this setting needs a device capability grant.
    #[must_use]
    pub const fn requires_capability(self) -> bool {
        matches!(self, Self::Notifications | Self::LocationServices)
    }
}

/// The full settings object with documented defaults.
///
/// Defaults: everything off except `data_compression` and `analytics`.
/// Capability-gated toggles default off so the app never assumes a grant
/// the user has not made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub notifications: bool,
    pub location_services: bool,
    pub dark_mode: bool,
    pub data_compression: bool,
    pub analytics: bool,
    pub offline_maps: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications: false,
            location_services: false,
            dark_mode: false,
            data_compression: true,
            analytics: true,
            offline_maps: false,
        }
    }
}

impl Settings {
    /// Read one toggle.
    #[must_use]
    pub const fn get(&self, key: SettingKey) -> bool {
        match key {
            SettingKey::Notifications => self.notifications,
            SettingKey::LocationServices => self.location_services,
            SettingKey::DarkMode => self.dark_mode,
            SettingKey::DataCompression => self.data_compression,
            SettingKey::Analytics => self.analytics,
            SettingKey::OfflineMaps => self.offline_maps,
        }
    }

    /// Write one toggle.
    pub const fn set(&mut self, key: SettingKey, value: bool) {
        match key {
            SettingKey::Notifications => self.notifications = value,
            SettingKey::LocationServices => self.location_services = value,
            SettingKey::DarkMode => self.dark_mode = value,
            SettingKey::DataCompression => self.data_compression = value,
            SettingKey::Analytics => self.analytics = value,
            SettingKey::OfflineMaps => self.offline_maps = value,
        }
    }

    /// Export to a JSON object clamped to the schema.
    #[must_use]
    pub fn export(&self) -> serde_json::Value {
        // Serialization of a plain bool struct cannot fail.
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Import from a JSON object.
    ///
    /// Unknown keys are ignored; missing keys take defaults, so
    /// `import(export())` is the identity.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidPayload`] if the value is not an
    /// object of booleans.
    pub fn import(value: &serde_json::Value) -> Result<Self, SettingsError> {
        if !value.is_object() {
            return Err(SettingsError::InvalidPayload(
                "expected a JSON object".to_owned(),
            ));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| SettingsError::InvalidPayload(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_defaults() {
        let s = Settings::default();
        assert!(!s.notifications);
        assert!(!s.location_services);
        assert!(!s.dark_mode);
        assert!(s.data_compression);
        assert!(s.analytics);
        assert!(!s.offline_maps);
    }

    #[test]
    fn test_get_set_roundtrip() {
        let mut s = Settings::default();
        for key in SettingKey::ALL {
            let before = s.get(key);
            s.set(key, !before);
            assert_eq!(s.get(key), !before);
        }
    }

    #[test]
    fn test_export_import_identity() {
        let mut s = Settings::default();
        s.set(SettingKey::DarkMode, true);
        s.set(SettingKey::Analytics, false);
        let exported = s.export();
        let imported = Settings::import(&exported).unwrap();
        assert_eq!(imported, s);
    }

    #[test]
    fn test_import_clamps_unknown_keys() {
        let value = serde_json::json!({
            "dark_mode": true,
            "legacy_toggle_nobody_remembers": true,
        });
        let imported = Settings::import(&value).unwrap();
        assert!(imported.dark_mode);
        // Missing keys take defaults.
        assert!(imported.data_compression);
    }

    #[test]
    fn test_import_rejects_non_object() {
        assert!(Settings::import(&serde_json::json!("dark")).is_err());
        assert!(Settings::import(&serde_json::json!(null)).is_err());
    }

    #[test]
    fn test_capability_gated_keys() {
        assert!(SettingKey::Notifications.requires_capability());
        assert!(SettingKey::LocationServices.requires_capability());
        assert!(!SettingKey::DarkMode.requires_capability());
    }
}
