//! User profile and preferences.
//!
//! DESIGN
//! ======
//! The profile exists only while a session does: fetch results are dropped
//! if the session token changed while the request was in flight, and the
//! runtime clears the profile as soon as auth turns anonymous.
//!
//! Preferences live beside the profile rather than inside it so they
//! survive sign-out and can be edited before the profile has loaded. A
//! fetched profile that carries preferences replaces the local copy.
//!
//! TRADE-OFFS
//! ==========
//! `update_preferences` merges locally first and only then tells the
//! server. What happens to the merge when the server refuses it is the
//! `PreferenceSync` policy.

#[cfg(test)]
#[path = "user_test.rs"]
mod user_test;

use std::sync::{Arc, Mutex};

use crate::config::PreferenceSync;
use crate::error::ApiError;
use crate::net::api;
use crate::net::client::ApiClient;
use crate::net::types::{Preferences, PreferencesPatch, ProfilePatch, UserProfile};
use crate::persist::{self, KeyValueStore, PREFERENCES_KEY};
use crate::state::auth::Session;
use crate::store::{Derived, Store, Subscription, derived, lock};

pub const UNKNOWN_USER: &str = "Unknown User";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserState {
    pub profile: Option<UserProfile>,
    pub preferences: Preferences,
    pub loading: bool,
    pub error: Option<String>,
}

impl UserState {
    /// Username, else email, else a placeholder. Empty when signed out.
    #[must_use]
    pub fn display_name(&self) -> String {
        let Some(profile) = &self.profile else {
            return String::new();
        };
        [Some(profile.username.as_str()), profile.email.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_USER)
            .to_owned()
    }

    /// The profile's avatar, else a generated initials avatar.
    #[must_use]
    pub fn avatar_url(&self) -> String {
        if let Some(url) = self.profile.as_ref().and_then(|p| p.avatar_url.as_deref()).filter(|u| !u.is_empty()) {
            return url.to_owned();
        }
        let username = self
            .profile
            .as_ref()
            .map(|p| p.username.as_str())
            .filter(|u| !u.is_empty())
            .unwrap_or("U");
        initials_avatar_url(username)
    }
}

/// `ui-avatars.com` URL for the first two characters of `username`.
#[must_use]
pub fn initials_avatar_url(username: &str) -> String {
    let initials: String = username.chars().take(2).collect::<String>().to_uppercase();
    format!("https://ui-avatars.com/api/?name={}&background=random&size=40", urlencoding::encode(&initials))
}

#[derive(Clone)]
pub struct UserStore {
    state: Store<UserState>,
    client: ApiClient,
    session: Session,
    storage: Arc<dyn KeyValueStore>,
    sync: PreferenceSync,
}

impl UserStore {
    #[must_use]
    pub fn new(client: ApiClient, session: Session, storage: Arc<dyn KeyValueStore>, sync: PreferenceSync) -> Self {
        Self { state: Store::default(), client, session, storage, sync }
    }

    #[must_use]
    pub fn get(&self) -> UserState {
        self.state.get()
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&UserState) + Send + Sync + 'static,
    {
        self.state.subscribe(observer)
    }

    /// Load persisted preferences. A malformed entry is removed.
    pub fn hydrate_preferences(&self) {
        match persist::load_json::<Preferences>(self.storage.as_ref(), PREFERENCES_KEY) {
            Ok(Some(preferences)) => self.state.mutate(|s| s.preferences = preferences),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "stored preferences are malformed; discarding");
                persist::remove(self.storage.as_ref(), PREFERENCES_KEY);
            }
        }
    }

    /// Write preferences to storage whenever they change, until the returned
    /// subscription drops.
    pub fn persist_preferences(&self) -> Subscription {
        let storage = Arc::clone(&self.storage);
        let last_written: Mutex<Option<Preferences>> = Mutex::new(None);
        self.state.subscribe(move |s| {
            let mut last = lock(&last_written);
            if last.as_ref() != Some(&s.preferences) {
                persist::save_json(storage.as_ref(), PREFERENCES_KEY, &s.preferences);
                *last = Some(s.preferences.clone());
            }
        })
    }

    /// `GET /auth/profile`. Returns `Ok(None)` without a request when signed
    /// out.
    ///
    /// # Errors
    ///
    /// Returns the failure (also stored in `error`), or `ApiError::Superseded`
    /// if the session changed while the request was in flight.
    pub async fn fetch_profile(&self) -> Result<Option<UserProfile>, ApiError> {
        let Some(token) = self.session.token() else {
            return Ok(None);
        };
        self.begin_loading();
        let result = api::profile(&self.client).await;
        self.finish(&token, result).map(Some)
    }

    /// `PUT /auth/profile`, then adopt the server's copy.
    ///
    /// # Errors
    ///
    /// See [`UserStore::fetch_profile`].
    pub async fn update_profile(&self, patch: &ProfilePatch) -> Result<UserProfile, ApiError> {
        let token = self.session.token();
        self.begin_loading();
        let result = api::update_profile(&self.client, patch).await;
        match token {
            Some(token) => self.finish(&token, result),
            None => {
                self.state.mutate(|s| s.loading = false);
                result
            }
        }
    }

    /// Merge `patch` locally, then push it to the server when signed in.
    ///
    /// # Errors
    ///
    /// Returns the remote failure. The local merge is kept or reverted per
    /// the configured `PreferenceSync`.
    pub async fn update_preferences(&self, patch: PreferencesPatch) -> Result<(), ApiError> {
        let previous = self.state.with(|s| s.preferences.clone());
        let merged = previous.merged(&patch);
        self.set_preferences(merged, None);

        if !self.session.is_authenticated() {
            return Ok(());
        }
        let body = ProfilePatch { preferences: Some(patch), ..ProfilePatch::default() };
        match api::update_profile(&self.client, &body).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let message = e.user_message();
                match self.sync {
                    PreferenceSync::KeepLocal => self.state.mutate(|s| s.error = Some(message)),
                    PreferenceSync::Revert => {
                        tracing::debug!("reverting preference merge after remote failure");
                        self.set_preferences(previous, Some(message));
                    }
                }
                Err(e)
            }
        }
    }

    /// Drop the profile. Preferences stay.
    pub fn clear(&self) {
        self.state.mutate(|s| {
            s.profile = None;
            s.loading = false;
            s.error = None;
        });
    }

    pub fn clear_error(&self) {
        self.state.mutate(|s| s.error = None);
    }

    #[must_use]
    pub fn profile(&self) -> Derived<Option<UserProfile>> {
        derived(&self.state, |s: &UserState| s.profile.clone())
    }

    #[must_use]
    pub fn is_logged_in(&self) -> Derived<bool> {
        derived(&self.state, |s: &UserState| s.profile.is_some())
    }

    #[must_use]
    pub fn preferences(&self) -> Derived<Preferences> {
        derived(&self.state, |s: &UserState| s.preferences.clone())
    }

    #[must_use]
    pub fn display_name(&self) -> Derived<String> {
        derived(&self.state, UserState::display_name)
    }

    #[must_use]
    pub fn avatar_url(&self) -> Derived<String> {
        derived(&self.state, UserState::avatar_url)
    }

    #[must_use]
    pub fn loading(&self) -> Derived<bool> {
        derived(&self.state, |s: &UserState| s.loading)
    }

    #[must_use]
    pub fn error(&self) -> Derived<Option<String>> {
        derived(&self.state, |s: &UserState| s.error.clone())
    }

    fn begin_loading(&self) {
        self.state.mutate(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    /// Apply a profile response fetched under `token`.
    fn finish(&self, token: &str, result: Result<UserProfile, ApiError>) -> Result<UserProfile, ApiError> {
        let current = self.session.token().as_deref() == Some(token);
        match result {
            Ok(_) if !current => {
                self.state.mutate(|s| s.loading = false);
                tracing::debug!("session changed during profile request; dropping result");
                Err(ApiError::Superseded)
            }
            Err(e) if !current => {
                self.state.mutate(|s| s.loading = false);
                Err(e)
            }
            Ok(profile) => {
                self.state.mutate(|s| {
                    if let Some(preferences) = &profile.preferences {
                        s.preferences = preferences.clone();
                    }
                    s.profile = Some(profile.clone());
                    s.loading = false;
                });
                Ok(profile)
            }
            Err(e) => {
                let message = e.user_message();
                self.state.mutate(|s| {
                    s.error = Some(message);
                    s.loading = false;
                });
                Err(e)
            }
        }
    }

    fn set_preferences(&self, preferences: Preferences, error: Option<String>) {
        self.state.mutate(|s| {
            if let Some(profile) = &mut s.profile {
                profile.preferences = Some(preferences.clone());
            }
            s.preferences = preferences;
            s.error = error;
        });
    }
}
