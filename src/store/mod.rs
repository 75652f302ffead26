//! Observable value containers.
//!
//! DESIGN
//! ======
//! `Store<T>` is the writable primitive; `Derived<T>` is a read-only view
//! computed from one or two sources. Both implement `Readable<T>` so derived
//! stores compose into a DAG without caring what kind of store feeds them.
//!
//! Observers run synchronously on the mutating call. A mutation issued from
//! inside an observer is queued and broadcast after the current round, so
//! every observer sees values in the order they were applied.

pub mod derived;
pub mod writable;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use derived::{Derived, derived, derived2};
pub use writable::Store;

/// Read side shared by writable and derived stores.
pub trait Readable<T>: Send + Sync {
    /// Clone the current value.
    fn get(&self) -> T;

    /// Register `observer`, calling it immediately with the current value and
    /// then after every change.
    fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static;
}

/// Handle returned by `subscribe`. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// Stop receiving notifications.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the observer registered for as long as the store lives.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Lock a mutex, recovering the guard if a panicking observer poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
