//! Sync core configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SUGBO_BACKEND_URL` - Base URL of the hosted backend
//! - `SUGBO_BACKEND_ANON_KEY` - Backend API key (anon role)
//!
//! ## Optional
//! - `SUGBO_DATA_DIR` - Directory for the on-disk key-value store
//!   (default: `.sugbo-data`)
//! - `SUGBO_CACHE_TTL_SECS` - Content cache TTL (default: 300)
//! - `SUGBO_HTTP_TIMEOUT_SECS` - Per-request deadline (default: 10)
//! - `SUGBO_INIT_DEADLINE_SECS` - Soft deadline for the startup prime
//!   (default: 15)

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Sync core configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct SyncConfig {
    /// Base URL of the hosted backend (REST + realtime).
    pub backend_url: String,
    /// Backend API key for the anon role.
    pub anon_key: SecretString,
    /// Directory backing the file key-value store.
    pub data_dir: PathBuf,
    /// Content cache time-to-live.
    pub cache_ttl: Duration,
    /// Deadline applied to each backend request.
    pub http_timeout: Duration,
    /// Soft deadline for the cache prime during initialization; overrun
    /// downgrades to degraded rather than failing.
    pub init_deadline: Duration,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("backend_url", &self.backend_url)
            .field("anon_key", &"[REDACTED]")
            .field("data_dir", &self.data_dir)
            .field("cache_ttl", &self.cache_ttl)
            .field("http_timeout", &self.http_timeout)
            .field("init_deadline", &self.init_deadline)
            .finish()
    }
}

impl SyncConfig {
    /// Default content cache TTL (5 minutes).
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let backend_url = get_required_env("SUGBO_BACKEND_URL")?;
        let anon_key = SecretString::from(get_required_env("SUGBO_BACKEND_ANON_KEY")?);
        let data_dir = PathBuf::from(get_env_or_default("SUGBO_DATA_DIR", ".sugbo-data"));
        let cache_ttl = get_duration_secs("SUGBO_CACHE_TTL_SECS", 300)?;
        let http_timeout = get_duration_secs("SUGBO_HTTP_TIMEOUT_SECS", 10)?;
        let init_deadline = get_duration_secs("SUGBO_INIT_DEADLINE_SECS", 15)?;

        Ok(Self {
            backend_url,
            anon_key,
            data_dir,
            cache_ttl,
            http_timeout,
            init_deadline,
        })
    }
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a duration (in whole seconds) from an environment variable.
fn get_duration_secs(key: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_get_duration_default() {
        let d = get_duration_secs("SUGBO_TEST_UNSET_DURATION", 42).unwrap();
        assert_eq!(d, Duration::from_secs(42));
    }

    #[test]
    fn test_debug_redacts_anon_key() {
        let config = SyncConfig {
            backend_url: "https://backend.example".to_owned(),
            anon_key: SecretString::from("very-secret-key"),
            data_dir: PathBuf::from(".sugbo-data"),
            cache_ttl: SyncConfig::DEFAULT_CACHE_TTL,
            http_timeout: Duration::from_secs(10),
            init_deadline: Duration::from_secs(15),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("https://backend.example"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("very-secret-key"));
    }
}
