//! Unified error handling for the sync core.
//!
//! Every public operation returns `Result<T, SyncError>`. The error kinds
//! form a stable taxonomy UI layers can switch on; `detail()` carries the
//! human-readable context. Expected failures (not found, validation,
//! permission) are values, never panics.

use thiserror::Error;

/// Stable error classification for UI consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    PermissionDenied,
    Unauthorized,
    Conflict,
    Network,
    StorageUnavailable,
    FetchFailed,
    AuthUnavailable,
    Internal,
}

/// Error type shared by every component of the sync core.
#[derive(Debug, Error, Clone)]
pub enum SyncError {
    /// Caller input failed validation. State is never mutated.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The user refused a required device capability. State is never
    /// mutated.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The backend rejected the credentials or session.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The operation conflicts with existing state (e.g. duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A network call failed or timed out. The previous snapshot stays in
    /// place; retry is the caller's policy.
    #[error("network error: {0}")]
    Network(String),

    /// The local key-value store is not ready.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A cache refetch failed. The last successful snapshot is preserved.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// The auth provider cannot be reached; the last known identity stays
    /// active.
    #[error("auth provider unavailable: {0}")]
    AuthUnavailable(String),

    /// Programmer error or corrupted invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// The stable classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Network(_) => ErrorKind::Network,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            Self::FetchFailed(_) => ErrorKind::FetchFailed,
            Self::AuthUnavailable(_) => ErrorKind::AuthUnavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Human-readable context for the failure.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Validation(d)
            | Self::NotFound(d)
            | Self::PermissionDenied(d)
            | Self::Unauthorized(d)
            | Self::Conflict(d)
            | Self::Network(d)
            | Self::StorageUnavailable(d)
            | Self::FetchFailed(d)
            | Self::AuthUnavailable(d)
            | Self::Internal(d) => d,
        }
    }
}

impl From<sugbo_core::EmailError> for SyncError {
    fn from(err: sugbo_core::EmailError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<sugbo_core::LanguageError> for SyncError {
    fn from(err: sugbo_core::LanguageError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<sugbo_core::SettingsError> for SyncError {
    fn from(err: sugbo_core::SettingsError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization error: {err}"))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("request deadline exceeded: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Result type alias for `SyncError`.
pub type Result<T> = std::result::Result<T, SyncError>;
