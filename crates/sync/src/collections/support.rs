//! Locally recorded support requests, newest first, capped.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use sugbo_core::SupportRequest;

use crate::error::{Result, SyncError};
use crate::store::{KeyValueStore, ScopedKeys};

use super::{load_or_default, save_json};

/// Maximum retained support requests per identity.
pub const SUPPORT_HISTORY_MAX: usize = 50;

struct State {
    keys: ScopedKeys,
    items: Vec<SupportRequest>,
}

pub struct SupportHistory {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<State>,
}

impl SupportHistory {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, scope: &str) -> Self {
        Self {
            store,
            state: Mutex::new(State {
                keys: ScopedKeys::for_identity(scope),
                items: Vec::new(),
            }),
        }
    }

    pub async fn set_scope(&self, scope: &str) {
        let mut state = self.state.lock().await;
        state.keys = ScopedKeys::for_identity(scope);
        state.items.clear();
    }

    pub async fn load(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.items =
            load_or_default(self.store.as_ref(), &state.keys.support_history()).await?;
        Ok(())
    }

    /// Requests, newest first.
    pub async fn list(&self) -> Vec<SupportRequest> {
        self.state.lock().await.items.clone()
    }

    /// Record a support request locally.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when subject or message is blank.
    pub async fn record(&self, subject: &str, message: &str) -> Result<SupportRequest> {
        let subject = subject.trim();
        let message = message.trim();
        if subject.is_empty() {
            return Err(SyncError::Validation("support subject is empty".to_owned()));
        }
        if message.is_empty() {
            return Err(SyncError::Validation("support message is empty".to_owned()));
        }

        let request = SupportRequest {
            subject: subject.to_owned(),
            message: message.to_owned(),
            created_at: Utc::now(),
        };
        let mut state = self.state.lock().await;
        state.items.insert(0, request.clone());
        state.items.truncate(SUPPORT_HISTORY_MAX);
        save_json(
            self.store.as_ref(),
            &state.keys.support_history(),
            &state.items,
        )
        .await?;
        Ok(request)
    }

    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.items.clear();
        self.store.remove(&state.keys.support_history()).await
    }
}
