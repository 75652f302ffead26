//! App-wide UI chrome state (sidebar, global loading indicator).
//!
//! DESIGN
//! ======
//! Loading is a count of in-flight requests rather than a flag, so two
//! overlapping requests can't clear each other's indicator. `ApiClient`
//! holds a `RequestGuard` for the duration of each exchange.

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;

use crate::store::{Derived, Store, Subscription, derived};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppState {
    pub sidebar_open: bool,
    pub pending_requests: usize,
}

impl AppState {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.pending_requests > 0
    }
}

#[derive(Clone, Default)]
pub struct AppStore {
    state: Store<AppState>,
}

impl AppStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> AppState {
        self.state.get()
    }

    pub fn toggle_sidebar(&self) {
        self.state.mutate(|s| s.sidebar_open = !s.sidebar_open);
    }

    pub fn set_sidebar_open(&self, open: bool) {
        self.state.mutate(|s| s.sidebar_open = open);
    }

    /// Mark a request as in flight until the guard drops.
    #[must_use]
    pub fn begin_request(&self) -> RequestGuard {
        self.state.mutate(|s| s.pending_requests += 1);
        RequestGuard { state: self.state.clone() }
    }

    #[must_use]
    pub fn is_loading(&self) -> Derived<bool> {
        derived(&self.state, AppState::is_loading)
    }

    #[must_use]
    pub fn sidebar_open(&self) -> Derived<bool> {
        derived(&self.state, |s: &AppState| s.sidebar_open)
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&AppState) + Send + Sync + 'static,
    {
        self.state.subscribe(observer)
    }
}

/// Decrements the in-flight count on drop.
#[must_use = "the request is only counted while the guard is alive"]
pub struct RequestGuard {
    state: Store<AppState>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.state
            .mutate(|s| s.pending_requests = s.pending_requests.saturating_sub(1));
    }
}
