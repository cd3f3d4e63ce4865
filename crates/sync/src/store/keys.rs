//! Canonical storage key scheme.
//!
//! Keys come in two flavors:
//!
//! - **Identity-scoped**: suffix the active identity's scope
//!   (`@tourist_app_favorites_<identity>`). No read or write path exists
//!   that crosses scopes.
//! - **Shared**: fixed names without an identity. Email history is the one
//!   deliberately shared user key (sign-in suggestions on a shared device);
//!   reset audit entries are shared and timestamped.
//!
//! The unsuffixed names are the legacy scheme from before identity scoping;
//! they exist here only so the migration pass can find and retire them.

/// Prefix shared by every key the app owns.
pub const KEY_PREFIX: &str = "@tourist_app_";

/// Shared email history key. Deliberately unscoped.
pub const EMAIL_HISTORY_KEY: &str = "@tourist_app_email_history";

/// Legacy unscoped keys retired by the migration pass.
pub const LEGACY_LANGUAGE_KEY: &str = "@tourist_app_language";
pub const LEGACY_SETTINGS_KEY: &str = "@tourist_app_settings";
pub const LEGACY_FAVORITES_KEY: &str = "@tourist_app_favorites";
pub const LEGACY_REVIEWS_KEY: &str = "@tourist_app_reviews";
pub const LEGACY_SUPPORT_HISTORY_KEY: &str = "@tourist_app_support_history";

/// Build the reset audit log key for a millisecond timestamp.
#[must_use]
pub fn reset_log_key(timestamp_ms: i64) -> String {
    format!("@tourist_app_reset_log_{timestamp_ms}")
}

/// The identity-scoped key set for one identity.
///
/// Constructing one of these is the only way to address user-scoped
/// storage, which is what enforces per-identity isolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedKeys {
    scope: String,
}

impl ScopedKeys {
    /// Keys for the given identity scope (opaque user id, or `guest`).
    #[must_use]
    pub fn for_identity(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    /// The identity scope these keys belong to.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn language(&self) -> String {
        format!("@tourist_app_language_{}", self.scope)
    }

    #[must_use]
    pub fn settings(&self) -> String {
        format!("@tourist_app_settings_{}", self.scope)
    }

    #[must_use]
    pub fn favorites(&self) -> String {
        format!("@tourist_app_favorites_{}", self.scope)
    }

    #[must_use]
    pub fn reviews(&self) -> String {
        format!("@tourist_app_reviews_{}", self.scope)
    }

    #[must_use]
    pub fn support_history(&self) -> String {
        format!("@tourist_app_support_history_{}", self.scope)
    }

    /// `(legacy, scoped)` pairs the migration pass moves, in a fixed order.
    ///
    /// Email history is absent: its key was never scoped and stays shared.
    #[must_use]
    pub fn migration_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (LEGACY_LANGUAGE_KEY, self.language()),
            (LEGACY_SETTINGS_KEY, self.settings()),
            (LEGACY_FAVORITES_KEY, self.favorites()),
            (LEGACY_REVIEWS_KEY, self.reviews()),
            (LEGACY_SUPPORT_HISTORY_KEY, self.support_history()),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_key_shapes() {
        let keys = ScopedKeys::for_identity("u-42");
        assert_eq!(keys.language(), "@tourist_app_language_u-42");
        assert_eq!(keys.settings(), "@tourist_app_settings_u-42");
        assert_eq!(keys.favorites(), "@tourist_app_favorites_u-42");
        assert_eq!(keys.reviews(), "@tourist_app_reviews_u-42");
        assert_eq!(
            keys.support_history(),
            "@tourist_app_support_history_u-42"
        );
    }

    #[test]
    fn test_guest_scope() {
        let keys = ScopedKeys::for_identity("guest");
        assert_eq!(keys.favorites(), "@tourist_app_favorites_guest");
    }

    #[test]
    fn test_scopes_never_collide() {
        let a = ScopedKeys::for_identity("user-a");
        let b = ScopedKeys::for_identity("user-b");
        assert_ne!(a.favorites(), b.favorites());
        assert_ne!(a.language(), b.language());
    }

    #[test]
    fn test_legacy_keys_are_unscoped_prefixes() {
        let keys = ScopedKeys::for_identity("u-1");
        for (legacy, scoped) in keys.migration_pairs() {
            assert!(scoped.starts_with(legacy));
            assert_ne!(legacy, scoped);
        }
    }

    #[test]
    fn test_reset_log_key() {
        assert_eq!(
            reset_log_key(1_700_000_000_000),
            "@tourist_app_reset_log_1700000000000"
        );
    }
}
