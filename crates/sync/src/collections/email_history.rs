//! Sign-in email suggestions.
//!
//! Deliberately shared across identities: the point is suggesting previous
//! addresses on a shared device's sign-in screen, before any identity is
//! established. Capped, most recently used first.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use sugbo_core::{Email, EmailHistoryEntry};

use crate::error::Result;
use crate::store::{KeyValueStore, keys::EMAIL_HISTORY_KEY};

use super::{load_or_default, save_json};

/// Maximum number of remembered addresses.
pub const EMAIL_HISTORY_MAX: usize = 10;

pub struct EmailHistory {
    store: Arc<dyn KeyValueStore>,
    entries: Mutex<Vec<EmailHistoryEntry>>,
}

impl EmailHistory {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub async fn load(&self) -> Result<()> {
        *self.entries.lock().await =
            load_or_default(self.store.as_ref(), EMAIL_HISTORY_KEY).await?;
        Ok(())
    }

    /// Remembered addresses, most recently used first.
    pub async fn list(&self) -> Vec<EmailHistoryEntry> {
        self.entries.lock().await.clone()
    }

    /// Record an address use. The address is normalized; a repeat moves it
    /// to the front with a fresh timestamp.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the address does not parse.
    pub async fn record(&self, raw_email: &str) -> Result<Email> {
        let email = Email::parse(raw_email)?;
        let mut entries = self.entries.lock().await;
        entries.retain(|e| e.email != email);
        entries.insert(
            0,
            EmailHistoryEntry {
                email: email.clone(),
                last_used_at: Utc::now(),
            },
        );
        entries.truncate(EMAIL_HISTORY_MAX);
        save_json(self.store.as_ref(), EMAIL_HISTORY_KEY, &*entries).await?;
        Ok(email)
    }

    pub async fn clear(&self) -> Result<()> {
        self.entries.lock().await.clear();
        self.store.remove(EMAIL_HISTORY_KEY).await
    }
}
