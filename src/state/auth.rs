//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! `Session` owns the token/user pair and its persisted copy. `ApiClient`
//! sees it only as a `SessionGate` (token source, 401 sink); `AuthStore`
//! layers the login/register/logout/refresh flows on top of both.
//!
//! DESIGN
//! ======
//! The token is set exactly when a user is: both are written together on
//! `establish` and cleared together on `clear`, and storage is updated before
//! observers are notified.
//!
//! Every login, register and logout bumps a generation counter. A response
//! that comes back after a newer action started is dropped as
//! `ApiError::Superseded` and never touches state or storage.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ApiError;
use crate::net::api;
use crate::net::client::{ApiClient, SessionGate};
use crate::net::types::{AuthPayload, SessionUser};
use crate::persist::{self, KeyValueStore, TOKEN_KEY, USER_KEY};
use crate::store::{Derived, Store, Subscription, derived};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<SessionUser>,
    pub token: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Coarse lifecycle phase, derived from `AuthState`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthPhase {
    Anonymous,
    Authenticating,
    Authenticated,
    Error,
}

impl AuthState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }

    #[must_use]
    pub fn phase(&self) -> AuthPhase {
        if self.loading {
            AuthPhase::Authenticating
        } else if self.is_authenticated() {
            AuthPhase::Authenticated
        } else if self.error.is_some() {
            AuthPhase::Error
        } else {
            AuthPhase::Anonymous
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// The session core. Clones share state.
#[derive(Clone)]
pub struct Session {
    state: Store<AuthState>,
    storage: Arc<dyn KeyValueStore>,
    generation: Arc<AtomicU64>,
}

impl Session {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { state: Store::default(), storage, generation: Arc::new(AtomicU64::new(0)) }
    }

    /// Restore a persisted session. Must run before any request is sent.
    ///
    /// A malformed user snapshot, or a token without a user (or the reverse),
    /// leaves the session anonymous and clears both keys.
    pub fn hydrate(&self) {
        let token = persist::read(self.storage.as_ref(), TOKEN_KEY);
        let user = persist::load_json::<SessionUser>(self.storage.as_ref(), USER_KEY);

        match (token, user) {
            (Some(token), Ok(Some(user))) => {
                tracing::info!(user_id = %user.id, "restored persisted session");
                self.state.set(AuthState { user: Some(user), token: Some(token), loading: false, error: None });
            }
            (None, Ok(None)) => {}
            (_, Err(e)) => {
                tracing::warn!(error = %e, "stored user is malformed; clearing session");
                self.remove_keys();
            }
            _ => {
                tracing::warn!("incomplete stored session; clearing");
                self.remove_keys();
            }
        }
    }

    #[must_use]
    pub fn get(&self) -> AuthState {
        self.state.get()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state.with(|s| s.token.clone())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.with(AuthState::is_authenticated)
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        self.state.subscribe(observer)
    }

    pub(crate) fn store(&self) -> &Store<AuthState> {
        &self.state
    }

    /// Start a new session action. Returns its generation.
    pub(crate) fn begin(&self) -> u64 {
        let generation = self.supersede();
        self.state.mutate(|s| {
            s.loading = true;
            s.error = None;
        });
        generation
    }

    /// Invalidate every action in flight. Returns the new generation.
    pub(crate) fn supersede(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Enter the authenticated state: persist, then publish.
    pub(crate) fn establish(&self, generation: u64, token: String, user: SessionUser) -> Result<(), ApiError> {
        if !self.is_current(generation) {
            return Err(ApiError::Superseded);
        }
        persist::write(self.storage.as_ref(), TOKEN_KEY, &token);
        persist::save_json(self.storage.as_ref(), USER_KEY, &user);
        self.state.set(AuthState { user: Some(user), token: Some(token), loading: false, error: None });
        Ok(())
    }

    /// Record a failed action. Returns `false` if the action was superseded.
    pub(crate) fn fail(&self, generation: u64, message: String) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.remove_keys();
        self.state.set(AuthState { user: None, token: None, loading: false, error: Some(message) });
        true
    }

    /// Replace the stored user while the session held by `token` is current.
    pub(crate) fn update_user(&self, token: &str, user: SessionUser) -> bool {
        if self.token().as_deref() != Some(token) {
            return false;
        }
        persist::save_json(self.storage.as_ref(), USER_KEY, &user);
        self.state.mutate(|s| s.user = Some(user));
        true
    }

    /// Enter the anonymous state: remove persisted keys, then publish.
    pub fn clear(&self) {
        self.remove_keys();
        if self.state.with(|s| *s != AuthState::default()) {
            self.state.set(AuthState::default());
        }
    }

    pub fn clear_error(&self) {
        self.state.mutate(|s| s.error = None);
    }

    fn remove_keys(&self) {
        persist::remove(self.storage.as_ref(), TOKEN_KEY);
        persist::remove(self.storage.as_ref(), USER_KEY);
    }
}

impl SessionGate for Session {
    fn bearer_token(&self) -> Option<String> {
        self.token()
    }

    fn expire(&self, token: &str) {
        if self.token().as_deref() != Some(token) {
            tracing::debug!("ignoring expiry for a replaced token");
            return;
        }
        tracing::warn!("session expired; signing out");
        self.supersede();
        self.clear();
    }
}

// =============================================================================
// AUTH STORE
// =============================================================================

/// Session flows over the API. `client` must carry this session as its gate.
#[derive(Clone)]
pub struct AuthStore {
    session: Session,
    client: ApiClient,
}

impl AuthStore {
    #[must_use]
    pub fn new(session: Session, client: ApiClient) -> Self {
        Self { session, client }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn get(&self) -> AuthState {
        self.session.get()
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        self.session.subscribe(observer)
    }

    /// Sign in with username and password.
    ///
    /// # Errors
    ///
    /// Returns the normalized failure (also stored in `error`), or
    /// `ApiError::Superseded` if a newer session action started meanwhile.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionUser, ApiError> {
        let generation = self.session.begin();
        let result = api::login(&self.client, username, password).await;
        self.finish(generation, result)
    }

    /// Create an account and sign in.
    ///
    /// # Errors
    ///
    /// See [`AuthStore::login`].
    pub async fn register(&self, username: &str, password: &str, email: Option<&str>) -> Result<SessionUser, ApiError> {
        let generation = self.session.begin();
        let result = api::register(&self.client, username, password, email).await;
        self.finish(generation, result)
    }

    fn finish(&self, generation: u64, result: Result<AuthPayload, ApiError>) -> Result<SessionUser, ApiError> {
        match result {
            Ok(payload) => {
                let user = SessionUser::from(&payload.user);
                self.session.establish(generation, payload.token, user.clone())?;
                tracing::info!(user_id = %user.id, username = %user.username, "signed in");
                Ok(user)
            }
            Err(e) => {
                if self.session.fail(generation, e.user_message()) {
                    Err(e)
                } else {
                    Err(ApiError::Superseded)
                }
            }
        }
    }

    /// Clear the local session, then tell the server (best-effort).
    ///
    /// The server call carries the dropped token explicitly, so a 401 for a
    /// token the server already revoked is just a failed logout.
    pub async fn logout(&self) {
        self.session.supersede();
        let token = self.session.token();
        self.session.clear();
        if let Some(token) = token {
            if let Err(e) = api::logout(&self.client, &token).await {
                tracing::debug!(error = %e, "server logout failed; already cleared locally");
            }
        }
        tracing::info!("signed out");
    }

    /// Re-read the signed-in user from the server. No-op when anonymous.
    ///
    /// A rejected token ends the session; a transport failure keeps it.
    /// The request is sent once, without retries.
    ///
    /// # Errors
    ///
    /// Returns the failure after applying the above.
    pub async fn refresh_profile(&self) -> Result<(), ApiError> {
        let Some(token) = self.session.token() else {
            return Ok(());
        };
        match api::verify_profile(&self.client).await {
            Ok(profile) => {
                self.session.update_user(&token, SessionUser::from(&profile));
                Ok(())
            }
            Err(e @ ApiError::Transport { .. }) => Err(e),
            Err(e) => {
                self.session.expire(&token);
                Err(e)
            }
        }
    }

    /// Acknowledge a failed action, returning to anonymous.
    pub fn clear_error(&self) {
        self.session.clear_error();
    }

    #[must_use]
    pub fn is_authenticated(&self) -> Derived<bool> {
        derived(self.session.store(), AuthState::is_authenticated)
    }

    #[must_use]
    pub fn current_user(&self) -> Derived<Option<SessionUser>> {
        derived(self.session.store(), |s: &AuthState| s.user.clone())
    }

    #[must_use]
    pub fn token(&self) -> Derived<Option<String>> {
        derived(self.session.store(), |s: &AuthState| s.token.clone())
    }

    #[must_use]
    pub fn loading(&self) -> Derived<bool> {
        derived(self.session.store(), |s: &AuthState| s.loading)
    }

    #[must_use]
    pub fn error(&self) -> Derived<Option<String>> {
        derived(self.session.store(), |s: &AuthState| s.error.clone())
    }

    #[must_use]
    pub fn phase(&self) -> Derived<AuthPhase> {
        derived(self.session.store(), AuthState::phase)
    }
}
