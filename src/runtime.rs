//! Explicit start-up and teardown of the client state graph.
//!
//! SYSTEM CONTEXT
//! ==============
//! The host calls `initialize` once, inside a tokio runtime, and keeps the
//! returned `AppHandle` for as long as the client lives. Nothing in this
//! crate starts on its own.
//!
//! DESIGN
//! ======
//! Start-up order matters:
//! 1. the session is hydrated from storage before any request can be sent;
//! 2. preferences and the explicit theme choice are hydrated;
//! 3. reactions are wired (preferences to storage and theme, theme to the
//!    applier, auth to the user store);
//! 4. the notification sweep starts.
//!
//! The auth reaction runs synchronously on every auth change. When the
//! signed-in identity appears (or changes) it spawns one profile fetch;
//! when it disappears it clears the profile before returning. Spawned
//! fetches are tracked so `settle` can await them and `shutdown` can abort
//! them.

#[cfg(test)]
#[path = "runtime_test.rs"]
mod runtime_test;

use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error_handler::ErrorHandler;
use crate::net::client::ApiClient;
use crate::net::transport::{ReqwestTransport, Transport, TransportError};
use crate::net::types::ThemeMode;
use crate::persist::KeyValueStore;
use crate::state::app::AppStore;
use crate::state::auth::{AuthStore, Session};
use crate::state::notifications::NotificationQueue;
use crate::state::theme::{ColorScheme, ThemeApplier, ThemeStore};
use crate::state::user::UserStore;
use crate::store::{Subscription, lock};

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("initialize must be called from within a tokio runtime")]
    NoRuntime,
}

/// Host-supplied collaborators.
pub struct Dependencies {
    pub transport: Arc<dyn Transport>,
    pub storage: Arc<dyn KeyValueStore>,
    pub theme_applier: Option<Arc<dyn ThemeApplier>>,
    /// Colour scheme the system reports at start-up.
    pub system_scheme: ColorScheme,
}

impl Dependencies {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self { transport, storage, theme_applier: None, system_scheme: ColorScheme::Light }
    }

    /// Use a `ReqwestTransport` built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: &ClientConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(&config.base_url, config.timeouts)?;
        Ok(Self::new(Arc::new(transport), storage))
    }

    #[must_use]
    pub fn with_theme_applier(mut self, applier: Arc<dyn ThemeApplier>) -> Self {
        self.theme_applier = Some(applier);
        self
    }

    #[must_use]
    pub fn with_system_scheme(mut self, scheme: ColorScheme) -> Self {
        self.system_scheme = scheme;
        self
    }
}

type Tasks = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Owner of every store and background task. Dropping it shuts down.
pub struct AppHandle {
    config: ClientConfig,
    app: AppStore,
    notifications: NotificationQueue,
    errors: ErrorHandler,
    client: ApiClient,
    auth: AuthStore,
    user: UserStore,
    theme: ThemeStore,
    subscriptions: Mutex<Vec<Subscription>>,
    tasks: Tasks,
    sweep: Mutex<Option<JoinHandle<()>>>,
}

/// Build, hydrate and wire the client state graph.
///
/// # Errors
///
/// Returns `InitError::NoRuntime` outside a tokio runtime.
pub fn initialize(config: ClientConfig, deps: Dependencies) -> Result<AppHandle, InitError> {
    let runtime = Handle::try_current().map_err(|_| InitError::NoRuntime)?;

    let notifications = NotificationQueue::new(&config.notifications);
    let errors = ErrorHandler::new(notifications.clone());
    let app = AppStore::new();

    let session = Session::new(Arc::clone(&deps.storage));
    session.hydrate();

    let client = ApiClient::new(deps.transport, errors.clone())
        .with_session(Arc::new(session.clone()))
        .with_app(app.clone())
        .with_retry(config.retry);
    let auth = AuthStore::new(session.clone(), client.clone());

    let user = UserStore::new(client.clone(), session, Arc::clone(&deps.storage), config.preference_sync);
    user.hydrate_preferences();

    let theme = ThemeStore::new(Arc::clone(&deps.storage), deps.system_scheme);
    if !theme.hydrate() {
        let preferred = user.get().preferences.theme_mode;
        if preferred != ThemeMode::System {
            theme.set_mode(preferred);
        }
    }

    let tasks: Tasks = Arc::default();
    let mut subscriptions = vec![user.persist_preferences(), sync_theme_with_preferences(&user, &theme)];
    if let Some(applier) = deps.theme_applier {
        subscriptions.push(theme.attach(applier));
    }
    subscriptions.push(sync_user_with_auth(&auth, &user, &runtime, &tasks));

    let sweep = notifications.spawn_sweep_task(config.notifications.sweep_interval, config.notifications.retention);

    tracing::info!(
        base_url = %config.base_url,
        authenticated = auth.get().is_authenticated(),
        theme = theme.mode().as_str(),
        "client runtime initialized"
    );

    Ok(AppHandle {
        config,
        app,
        notifications,
        errors,
        client,
        auth,
        user,
        theme,
        subscriptions: Mutex::new(subscriptions),
        tasks,
        sweep: Mutex::new(Some(sweep)),
    })
}

/// Push every change of the preferred theme into the theme store.
///
/// Only changes count: the value present at wiring time was already
/// reconciled with the persisted explicit choice.
fn sync_theme_with_preferences(user: &UserStore, theme: &ThemeStore) -> Subscription {
    let theme = theme.clone();
    let last_seen = Mutex::new(user.get().preferences.theme_mode);
    user.subscribe(move |state| {
        let mode = state.preferences.theme_mode;
        let changed = {
            let mut last = lock(&last_seen);
            let changed = *last != mode;
            *last = mode;
            changed
        };
        if changed {
            theme.set_mode(mode);
        }
    })
}

/// Fetch the profile when a signed-in identity appears; clear it when it goes.
fn sync_user_with_auth(auth: &AuthStore, user: &UserStore, runtime: &Handle, tasks: &Tasks) -> Subscription {
    let user = user.clone();
    let runtime = runtime.clone();
    let tasks = Arc::clone(tasks);
    let last_token: Mutex<Option<String>> = Mutex::new(None);

    auth.subscribe(move |state| {
        let token = state.is_authenticated().then(|| state.token.clone()).flatten();
        let previous = {
            let mut last = lock(&last_token);
            if *last == token {
                return;
            }
            std::mem::replace(&mut *last, token.clone())
        };

        if previous.is_some() {
            user.clear();
        }
        if token.is_some() {
            let user = user.clone();
            let fetch = runtime.spawn(async move {
                if let Err(e) = user.fetch_profile().await {
                    tracing::debug!(error = %e, "profile fetch after sign-in failed");
                }
            });
            let mut tasks = lock(&tasks);
            tasks.retain(|t| !t.is_finished());
            tasks.push(fetch);
        }
    })
}

impl AppHandle {
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn app(&self) -> &AppStore {
        &self.app
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    #[must_use]
    pub fn errors(&self) -> &ErrorHandler {
        &self.errors
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    #[must_use]
    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    #[must_use]
    pub fn user(&self) -> &UserStore {
        &self.user
    }

    #[must_use]
    pub fn theme(&self) -> &ThemeStore {
        &self.theme
    }

    /// Wait for reaction tasks (such as a triggered profile fetch),
    /// including any they start in turn.
    pub async fn settle(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = lock(&self.tasks).drain(..).collect();
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(e) = task.await {
                    if !e.is_cancelled() {
                        tracing::error!(error = %e, "reaction task failed");
                    }
                }
            }
        }
    }

    /// Unwire reactions and stop background work. Store values stay readable.
    pub fn shutdown(&self) {
        lock(&self.subscriptions).clear();
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        if let Some(sweep) = lock(&self.sweep).take() {
            sweep.abort();
            tracing::debug!("client runtime shut down");
        }
        self.notifications.shutdown();
    }
}

impl Drop for AppHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
