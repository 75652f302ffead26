//! Writable store.

#[cfg(test)]
#[path = "writable_test.rs"]
mod writable_test;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::{Readable, Subscription, lock};

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A shared, observable value. Cloning yields another handle to the same value.
pub struct Store<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    value: Mutex<T>,
    observers: Mutex<Vec<(u64, Observer<T>)>>,
    next_id: AtomicU64,
    dispatch: Mutex<Dispatch<T>>,
}

/// Pending broadcasts. `running` is set while one call drains the queue.
struct Dispatch<T> {
    running: bool,
    pending: VecDeque<T>,
}

/// Clears `running` if an observer panics mid-broadcast.
struct DispatchGuard<'a, T> {
    dispatch: &'a Mutex<Dispatch<T>>,
}

impl<T> Drop for DispatchGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut dispatch = lock(self.dispatch);
            dispatch.running = false;
            dispatch.pending.clear();
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Store<T> {
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: Mutex::new(initial),
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                dispatch: Mutex::new(Dispatch { running: false, pending: VecDeque::new() }),
            }),
        }
    }

    /// Clone the current value.
    #[must_use]
    pub fn get(&self) -> T {
        lock(&self.inner.value).clone()
    }

    /// Read the current value without cloning it.
    ///
    /// `f` runs under the value lock and must not touch this store.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&lock(&self.inner.value))
    }

    /// Replace the value and notify every observer.
    pub fn set(&self, value: T) {
        let drain = {
            let mut current = lock(&self.inner.value);
            *current = value.clone();
            self.enqueue(value)
        };
        if drain {
            self.drain();
        }
    }

    /// Replace the value with `f(current)` and notify every observer.
    ///
    /// `f` runs under the value lock and must not touch this store.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let drain = {
            let mut current = lock(&self.inner.value);
            let next = f(&current);
            *current = next.clone();
            self.enqueue(next)
        };
        if drain {
            self.drain();
        }
    }

    /// Mutate the value in place and notify every observer.
    pub fn mutate(&self, f: impl FnOnce(&mut T)) {
        let drain = {
            let mut current = lock(&self.inner.value);
            f(&mut current);
            self.enqueue(current.clone())
        };
        if drain {
            self.drain();
        }
    }

    /// Register `observer`. It is called right away with the current value.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let observer: Observer<T> = Arc::new(observer);
        lock(&self.inner.observers).push((id, Arc::clone(&observer)));

        let current = self.get();
        observer(&current);

        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.observers).retain(|(other, _)| *other != id);
            }
        })
    }

    /// Number of registered observers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.observers).len()
    }

    /// Queue `value` for broadcast. Called with the value lock held, so the
    /// queue order matches the write order. Returns `true` if the caller
    /// must drain.
    fn enqueue(&self, value: T) -> bool {
        let mut dispatch = lock(&self.inner.dispatch);
        dispatch.pending.push_back(value);
        !std::mem::replace(&mut dispatch.running, true)
    }

    fn drain(&self) {
        let _guard = DispatchGuard { dispatch: &self.inner.dispatch };
        loop {
            let next = {
                let mut dispatch = lock(&self.inner.dispatch);
                let Some(next) = dispatch.pending.pop_front() else {
                    // Cleared under the same lock as the empty check.
                    dispatch.running = false;
                    return;
                };
                next
            };
            let observers: Vec<Observer<T>> = lock(&self.inner.observers)
                .iter()
                .map(|(_, observer)| Arc::clone(observer))
                .collect();
            for observer in observers {
                observer(&next);
            }
        }
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: Default + Clone + Send + Sync + 'static> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("value", &*lock(&self.inner.value))
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Readable<T> for Store<T> {
    fn get(&self) -> T {
        Store::get(self)
    }

    fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Store::subscribe(self, observer)
    }
}
