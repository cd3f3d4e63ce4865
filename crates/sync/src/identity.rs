//! Identity context over an external auth provider.
//!
//! The core never speaks the auth provider's wire protocol; it consumes
//! [`AuthProvider`] and maintains a stable local view of the active
//! [`Identity`]. Transitions notify subscribers synchronously, in
//! registration order, after the provider call resolves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tracing::{info, warn};

use sugbo_core::{Email, Identity};

use crate::error::{Result, SyncError};

/// A signed-in user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Opaque user id.
    pub id: String,
    pub email: Email,
    pub display_name: Option<String>,
    /// Whether the provider has confirmed the email address.
    pub email_confirmed: bool,
}

impl AuthUser {
    fn to_identity(&self) -> Identity {
        let identity = Identity::signed_in(self.id.clone(), self.email.clone());
        match &self.display_name {
            Some(name) => identity.with_display_name(name.clone()),
            None => identity,
        }
    }
}

/// Optional profile payload for sign-up.
#[derive(Debug, Clone, Default)]
pub struct SignUpProfile {
    pub display_name: Option<String>,
}

/// External authentication provider.
///
/// Error mapping contract: duplicate registration is `Conflict`, bad
/// credentials are `Unauthorized`, an unreachable provider is
/// `AuthUnavailable`.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Register a new account. The provider may require email confirmation
    /// before the session is usable.
    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        profile: Option<SignUpProfile>,
    ) -> Result<AuthUser>;

    /// Sign in with email and password.
    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthUser>;

    /// End the current session.
    async fn sign_out(&self) -> Result<()>;

    /// The currently signed-in user, if a session exists.
    async fn current(&self) -> Result<Option<AuthUser>>;
}

/// Handle returned by [`IdentityContext::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityListenerHandle(u64);

type IdentityListener = Arc<dyn Fn(&Identity) + Send + Sync>;

/// The process-local view of the active identity.
pub struct IdentityContext {
    provider: Arc<dyn AuthProvider>,
    current: RwLock<Identity>,
    listeners: Mutex<Vec<(u64, IdentityListener)>>,
    next_handle: AtomicU64,
}

impl IdentityContext {
    /// Wrap an auth provider; starts as guest until resolved.
    #[must_use]
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            current: RwLock::new(Identity::guest()),
            listeners: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// The active identity (guest when signed out).
    #[must_use]
    pub fn current(&self) -> Identity {
        self.current
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Register a transition listener. Listeners run synchronously, in
    /// registration order, with the new identity.
    pub fn subscribe(
        &self,
        listener: impl Fn(&Identity) + Send + Sync + 'static,
    ) -> IdentityListenerHandle {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.listeners_guard().push((id, Arc::new(listener)));
        IdentityListenerHandle(id)
    }

    /// Drop a transition listener.
    pub fn unsubscribe(&self, handle: IdentityListenerHandle) {
        self.listeners_guard().retain(|(id, _)| *id != handle.0);
    }

    /// Ask the provider for the current session and adopt it.
    ///
    /// On `AuthUnavailable` the last known identity stays active and the
    /// error is returned for the caller's health bookkeeping.
    pub async fn resolve(&self) -> Result<Identity> {
        match self.provider.current().await {
            Ok(user) => Ok(self.transition(user.as_ref())),
            Err(err @ SyncError::AuthUnavailable(_)) => {
                warn!(error = %err, "auth provider unreachable, keeping last known identity");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Sign in and transition.
    pub async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity> {
        let user = self.provider.sign_in(email, password).await?;
        Ok(self.transition(Some(&user)))
    }

    /// Register and transition.
    pub async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        profile: Option<SignUpProfile>,
    ) -> Result<Identity> {
        let user = self.provider.sign_up(email, password, profile).await?;
        Ok(self.transition(Some(&user)))
    }

    /// Sign out and transition to guest.
    pub async fn sign_out(&self) -> Result<Identity> {
        self.provider.sign_out().await?;
        Ok(self.transition(None))
    }

    /// Adopt the given auth state and notify listeners if it changed.
    pub fn transition(&self, user: Option<&AuthUser>) -> Identity {
        let next = user.map_or_else(Identity::guest, AuthUser::to_identity);
        let changed = {
            let mut current = self
                .current
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        };

        if changed {
            info!(identity = %next.scope(), "identity transition");
            let listeners: Vec<IdentityListener> = self
                .listeners_guard()
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect();
            for listener in listeners {
                listener(&next);
            }
        }
        next
    }

    fn listeners_guard(&self) -> std::sync::MutexGuard<'_, Vec<(u64, IdentityListener)>> {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// =============================================================================
// StaticAuthProvider
// =============================================================================

/// In-memory auth provider for tests and offline development.
///
/// Accounts registered via `sign_up` (or seeded with `seed_user`) can sign
/// in; `set_available(false)` simulates an unreachable provider.
#[derive(Default)]
pub struct StaticAuthProvider {
    accounts: Mutex<HashMap<String, (String, AuthUser)>>,
    session: Mutex<Option<AuthUser>>,
    available: AtomicBool,
    next_id: AtomicU64,
}

impl StaticAuthProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            session: Mutex::new(None),
            available: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
        }
    }

    /// Toggle reachability; while unreachable every call fails with
    /// `AuthUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Seed an account with a fixed id, bypassing sign-up.
    pub fn seed_user(&self, id: &str, email: &Email, password: &str) {
        let user = AuthUser {
            id: id.to_owned(),
            email: email.clone(),
            display_name: None,
            email_confirmed: true,
        };
        self.accounts_guard()
            .insert(email.as_str().to_owned(), (password.to_owned(), user));
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::AuthUnavailable(
                "auth provider unreachable".to_owned(),
            ))
        }
    }

    fn accounts_guard(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, (String, AuthUser)>> {
        self.accounts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn session_guard(&self) -> std::sync::MutexGuard<'_, Option<AuthUser>> {
        self.session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        profile: Option<SignUpProfile>,
    ) -> Result<AuthUser> {
        self.check_available()?;
        if password.len() < 8 {
            return Err(SyncError::Validation(
                "password must be at least 8 characters".to_owned(),
            ));
        }

        let mut accounts = self.accounts_guard();
        if accounts.contains_key(email.as_str()) {
            return Err(SyncError::Conflict(format!(
                "an account already exists for {email}"
            )));
        }

        let id = format!("u-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let user = AuthUser {
            id,
            email: email.clone(),
            display_name: profile.and_then(|p| p.display_name),
            email_confirmed: false,
        };
        accounts.insert(email.as_str().to_owned(), (password.to_owned(), user.clone()));
        drop(accounts);

        *self.session_guard() = Some(user.clone());
        Ok(user)
    }

    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthUser> {
        self.check_available()?;
        let accounts = self.accounts_guard();
        let Some((stored_password, user)) = accounts.get(email.as_str()) else {
            return Err(SyncError::Unauthorized("invalid credentials".to_owned()));
        };
        if stored_password != password {
            return Err(SyncError::Unauthorized("invalid credentials".to_owned()));
        }
        let user = user.clone();
        drop(accounts);

        *self.session_guard() = Some(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> Result<()> {
        self.check_available()?;
        *self.session_guard() = None;
        Ok(())
    }

    async fn current(&self) -> Result<Option<AuthUser>> {
        self.check_available()?;
        Ok(self.session_guard().clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let provider = Arc::new(StaticAuthProvider::new());
        let context = IdentityContext::new(Arc::clone(&provider) as Arc<dyn AuthProvider>);

        let identity = context
            .sign_up(&email("ana@example.com"), "strong-password", None)
            .await
            .unwrap();
        assert!(!identity.is_guest());
        assert_eq!(context.current(), identity);

        context.sign_out().await.unwrap();
        assert!(context.current().is_guest());

        let again = context
            .sign_in(&email("ana@example.com"), "strong-password")
            .await
            .unwrap();
        assert_eq!(again.scope(), identity.scope());
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_conflicts() {
        let provider = StaticAuthProvider::new();
        provider
            .sign_up(&email("ana@example.com"), "strong-password", None)
            .await
            .unwrap();
        let err = provider
            .sign_up(&email("ana@example.com"), "other-password", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_bad_credentials_unauthorized() {
        let provider = StaticAuthProvider::new();
        provider.seed_user("u-1", &email("ana@example.com"), "correct-horse");
        let err = provider
            .sign_in(&email("ana@example.com"), "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_listeners_fire_in_registration_order() {
        let provider = Arc::new(StaticAuthProvider::new());
        provider.seed_user("u-1", &email("ana@example.com"), "correct-horse");
        let context = IdentityContext::new(provider as Arc<dyn AuthProvider>);

        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            context.subscribe(move |identity| {
                order
                    .lock()
                    .unwrap()
                    .push((tag, identity.scope().to_owned()));
            });
        }

        context
            .sign_in(&email("ana@example.com"), "correct-horse")
            .await
            .unwrap();

        let seen = order.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("first", "u-1".to_owned()),
                ("second", "u-1".to_owned()),
                ("third", "u-1".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_notifications() {
        let provider = Arc::new(StaticAuthProvider::new());
        provider.seed_user("u-1", &email("ana@example.com"), "correct-horse");
        let context = IdentityContext::new(provider as Arc<dyn AuthProvider>);

        let count = Arc::new(Mutex::new(0));
        let handle = {
            let count = Arc::clone(&count);
            context.subscribe(move |_| *count.lock().unwrap() += 1)
        };
        context.unsubscribe(handle);

        context
            .sign_in(&email("ana@example.com"), "correct-horse")
            .await
            .unwrap();
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_provider_keeps_last_identity() {
        let provider = Arc::new(StaticAuthProvider::new());
        provider.seed_user("u-1", &email("ana@example.com"), "correct-horse");
        let context = IdentityContext::new(Arc::clone(&provider) as Arc<dyn AuthProvider>);
        context
            .sign_in(&email("ana@example.com"), "correct-horse")
            .await
            .unwrap();

        provider.set_available(false);
        let err = context.resolve().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthUnavailable);
        assert_eq!(context.current().scope(), "u-1");
    }

    #[tokio::test]
    async fn test_transition_to_same_identity_is_silent() {
        let provider = Arc::new(StaticAuthProvider::new());
        let context = IdentityContext::new(provider as Arc<dyn AuthProvider>);

        let count = Arc::new(Mutex::new(0));
        {
            let count = Arc::clone(&count);
            context.subscribe(move |_| *count.lock().unwrap() += 1);
        }

        // Already guest; transitioning to guest again must not notify.
        context.transition(None);
        assert_eq!(*count.lock().unwrap(), 0);
    }
}
