//! The active user identity.

use serde::{Deserialize, Serialize};

use super::email::Email;

/// The storage scope used when no user is signed in.
pub const GUEST_SCOPE: &str = "guest";

/// The process-active identity.
///
/// Exactly one identity is active at a time. When no user is signed in the
/// distinguished guest identity is active; its storage scope is the literal
/// `guest`, so guest data is still identity-scoped and survives sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user identifier assigned by the auth provider.
    pub id: String,
    /// The email the user signed in with. `None` for the guest identity.
    pub email: Option<Email>,
    /// Optional display name from the profile payload.
    pub display_name: Option<String>,
}

impl Identity {
    /// Create an identity for a signed-in user.
    #[must_use]
    pub fn signed_in(id: impl Into<String>, email: Email) -> Self {
        Self {
            id: id.into(),
            email: Some(email),
            display_name: None,
        }
    }

    /// The distinguished guest identity.
    #[must_use]
    pub fn guest() -> Self {
        Self {
            id: GUEST_SCOPE.to_owned(),
            email: None,
            display_name: None,
        }
    }

    /// Whether this is the guest identity.
    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.id == GUEST_SCOPE
    }

    /// The key-namespace component for this identity.
    ///
    /// Every user-scoped storage key embeds this value; see
    /// `sugbo-sync::store::keys`.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.id
    }

    /// Attach a display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}
