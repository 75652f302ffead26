//! Read-only stores computed from other stores.

#[cfg(test)]
#[path = "derived_test.rs"]
mod derived_test;

use std::sync::Arc;

use super::{Readable, Store, Subscription};

/// A store whose value is a pure function of one or more sources.
///
/// The source subscriptions live as long as any clone of the derived store.
pub struct Derived<T> {
    store: Store<T>,
    sources: Arc<Vec<Subscription>>,
}

impl<T: Clone + Send + Sync + 'static> Derived<T> {
    #[must_use]
    pub fn get(&self) -> T {
        self.store.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.store.with(f)
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.store.subscribe(observer)
    }
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), sources: Arc::clone(&self.sources) }
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Derived").field("value", &self.get()).finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Readable<T> for Derived<T> {
    fn get(&self) -> T {
        Derived::get(self)
    }

    fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Derived::subscribe(self, observer)
    }
}

/// Derive a store from a single source.
pub fn derived<S, A, T, F>(source: &S, f: F) -> Derived<T>
where
    S: Readable<A>,
    A: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(&A) -> T + Send + Sync + 'static,
{
    let store = Store::new(f(&source.get()));
    let target = store.clone();
    let subscription = source.subscribe(move |value| target.set(f(value)));
    Derived { store, sources: Arc::new(vec![subscription]) }
}

/// Derive a store from two sources; recomputed when either changes.
pub fn derived2<SA, SB, A, B, T, F>(a: &SA, b: &SB, f: F) -> Derived<T>
where
    SA: Readable<A> + Clone + 'static,
    SB: Readable<B> + Clone + 'static,
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(&A, &B) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let store = Store::new(f(&a.get(), &b.get()));

    let on_a = {
        let target = store.clone();
        let other = b.clone();
        let f = Arc::clone(&f);
        a.subscribe(move |value| target.set(f(value, &other.get())))
    };
    let on_b = {
        let target = store.clone();
        let other = a.clone();
        let f = Arc::clone(&f);
        b.subscribe(move |value| target.set(f(&other.get(), value)))
    };

    Derived { store, sources: Arc::new(vec![on_a, on_b]) }
}
