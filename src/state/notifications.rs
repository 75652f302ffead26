//! Transient notification queue (toasts).
//!
//! DESIGN
//! ======
//! Notifications are displayed in insertion order and bounded by `max_size`;
//! inserting past the bound evicts the oldest entries. Each entry either
//! expires after a duration (a tokio timer calls `dismiss`) or stays until
//! dismissed. Error notifications stay by default.
//!
//! A background sweep purges entries older than the retention window in case
//! a timer was never scheduled, e.g. because no runtime was available.

#[cfg(test)]
#[path = "notifications_test.rs"]
mod notifications_test;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::store::{Derived, Store, Subscription, derived, lock};

pub type NotificationId = Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationKind {
    #[must_use]
    pub fn icon(self) -> &'static str {
        match self {
            Self::Success => "✓",
            Self::Error => "✕",
            Self::Warning => "⚠",
            Self::Info => "ℹ",
        }
    }
}

/// When a notification leaves the queue on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expiry {
    After(Duration),
    Never,
}

/// Screen corner or edge the host renders the queue at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Position {
    #[default]
    TopRight,
    TopLeft,
    BottomRight,
    BottomLeft,
    TopCenter,
    BottomCenter,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActionVariant {
    #[default]
    Primary,
    Secondary,
    Danger,
}

/// A button attached to a notification.
#[derive(Clone)]
pub struct NotificationAction {
    pub label: String,
    pub variant: ActionVariant,
    effect: Arc<dyn Fn() + Send + Sync>,
}

impl NotificationAction {
    pub fn new<F>(label: impl Into<String>, variant: ActionVariant, effect: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self { label: label.into(), variant, effect: Arc::new(effect) }
    }

    pub fn invoke(&self) {
        (self.effect)();
    }
}

impl fmt::Debug for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationAction")
            .field("label", &self.label)
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: Instant,
    pub expiry: Expiry,
    pub actions: Vec<NotificationAction>,
}

// =============================================================================
// BUILDER
// =============================================================================

/// A notification before the queue assigns its id and timestamp.
#[derive(Clone, Debug)]
pub struct NewNotification {
    kind: NotificationKind,
    title: String,
    message: String,
    duration: Option<Duration>,
    persistent: Option<bool>,
    actions: Vec<NotificationAction>,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: String::new(),
            duration: None,
            persistent: None,
            actions: Vec::new(),
        }
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title)
    }

    /// Error notifications are persistent unless `persistent(false)` is set.
    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title)
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title)
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Auto-dismiss after `duration`. Zero means never.
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    #[must_use]
    pub fn action(mut self, action: NotificationAction) -> Self {
        self.actions.push(action);
        self
    }

    fn expiry(&self, default_duration: Duration) -> Expiry {
        let persistent = self
            .persistent
            .unwrap_or(self.kind == NotificationKind::Error);
        let duration = self.duration.unwrap_or(default_duration);
        if persistent || duration.is_zero() { Expiry::Never } else { Expiry::After(duration) }
    }

    fn build(self, default_duration: Duration) -> Notification {
        let expiry = self.expiry(default_duration);
        Notification {
            id: Uuid::new_v4(),
            kind: self.kind,
            title: self.title,
            message: self.message,
            created_at: Instant::now(),
            expiry,
            actions: self.actions,
        }
    }
}

// =============================================================================
// QUEUE
// =============================================================================

#[derive(Clone, Debug)]
pub struct NotificationState {
    pub items: Vec<Notification>,
    pub position: Position,
    pub max_size: usize,
}

/// Bounded, ordered queue of notifications. Clones share the same queue.
#[derive(Clone)]
pub struct NotificationQueue {
    state: Store<NotificationState>,
    timers: Arc<Mutex<HashMap<NotificationId, JoinHandle<()>>>>,
    default_duration: Duration,
}

impl NotificationQueue {
    #[must_use]
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            state: Store::new(NotificationState {
                items: Vec::new(),
                position: Position::default(),
                max_size: config.max_size.max(1),
            }),
            timers: Arc::new(Mutex::new(HashMap::new())),
            default_duration: config.default_duration,
        }
    }

    /// Append a notification, evicting the oldest entries past the bound.
    pub fn add(&self, notification: NewNotification) -> NotificationId {
        let notification = notification.build(self.default_duration);
        let id = notification.id;
        let expiry = notification.expiry;

        let mut evicted = Vec::new();
        self.state.mutate(|s| {
            s.items.push(notification);
            evicted.extend(evict_oldest(&mut s.items, s.max_size));
        });
        self.cancel_timers(&evicted);

        if let Expiry::After(duration) = expiry {
            if !evicted.contains(&id) {
                self.schedule_dismiss(id, duration);
            }
        }
        id
    }

    pub fn success(&self, title: &str, message: &str) -> NotificationId {
        self.add(NewNotification::success(title).message(message))
    }

    pub fn error(&self, title: &str, message: &str) -> NotificationId {
        self.add(NewNotification::error(title).message(message))
    }

    pub fn warning(&self, title: &str, message: &str) -> NotificationId {
        self.add(NewNotification::warning(title).message(message))
    }

    pub fn info(&self, title: &str, message: &str) -> NotificationId {
        self.add(NewNotification::info(title).message(message))
    }

    /// Remove one notification. Returns `false` if it was already gone.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        self.cancel_timers(&[id]);
        self.remove(id)
    }

    pub fn dismiss_all(&self) {
        self.cancel_all_timers();
        self.state.mutate(|s| s.items.clear());
    }

    /// Change the bound, evicting the oldest entries if now over it.
    pub fn set_max_size(&self, max_size: usize) {
        let mut evicted = Vec::new();
        self.state.mutate(|s| {
            s.max_size = max_size.max(1);
            evicted.extend(evict_oldest(&mut s.items, s.max_size));
        });
        self.cancel_timers(&evicted);
    }

    pub fn set_position(&self, position: Position) {
        self.state.mutate(|s| s.position = position);
    }

    /// Edit a notification in place. Returns `false` if it is not queued.
    pub fn update(&self, id: NotificationId, f: impl FnOnce(&mut Notification)) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.state.mutate(|s| {
            if let Some(n) = s.items.iter_mut().find(|n| n.id == id) {
                f(n);
            }
        });
        true
    }

    /// Invoke the `index`-th action of a notification.
    pub fn run_action(&self, id: NotificationId, index: usize) -> bool {
        let action = self
            .state
            .with(|s| s.items.iter().find(|n| n.id == id).and_then(|n| n.actions.get(index).cloned()));
        match action {
            Some(action) => {
                action.invoke();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        self.state
            .with(|s| s.items.iter().find(|n| n.id == id).cloned())
    }

    #[must_use]
    pub fn items(&self) -> Vec<Notification> {
        self.state.with(|s| s.items.clone())
    }

    #[must_use]
    pub fn by_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.state
            .with(|s| s.items.iter().filter(|n| n.kind == kind).cloned().collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.with(|s| s.items.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.state.with(|s| s.position)
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.state.with(|s| s.max_size)
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&NotificationState) + Send + Sync + 'static,
    {
        self.state.subscribe(observer)
    }

    /// Number of queued notifications, as a store.
    #[must_use]
    pub fn count(&self) -> Derived<usize> {
        derived(&self.state, |s: &NotificationState| s.items.len())
    }

    /// Drop entries older than `retention` as of `now`. Returns how many.
    pub fn sweep_expired(&self, now: Instant, retention: Duration) -> usize {
        let stale: Vec<NotificationId> = self.state.with(|s| {
            s.items
                .iter()
                .filter(|n| now.saturating_duration_since(n.created_at) > retention)
                .map(|n| n.id)
                .collect()
        });
        if stale.is_empty() {
            return 0;
        }
        self.cancel_timers(&stale);
        self.state.mutate(|s| s.items.retain(|n| !stale.contains(&n.id)));
        tracing::debug!(count = stale.len(), "swept stale notifications");
        stale.len()
    }

    /// Spawn the periodic safety-net sweep. Returns a handle for shutdown.
    pub fn spawn_sweep_task(&self, interval: Duration, retention: Duration) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                queue.sweep_expired(Instant::now(), retention);
            }
        })
    }

    /// Abort every pending auto-dismiss timer. Queued entries stay.
    pub fn shutdown(&self) {
        self.cancel_all_timers();
    }

    fn remove(&self, id: NotificationId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.state.mutate(|s| s.items.retain(|n| n.id != id));
        true
    }

    fn schedule_dismiss(&self, id: NotificationId, after: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%id, "no tokio runtime; notification will not auto-dismiss");
            return;
        };
        let queue = self.clone();
        // Held across the spawn: the timer must find its own entry.
        let mut timers = lock(&self.timers);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(after).await;
            lock(&queue.timers).remove(&id);
            queue.remove(id);
        });
        timers.insert(id, handle);
    }

    fn cancel_timers(&self, ids: &[NotificationId]) {
        if ids.is_empty() {
            return;
        }
        let mut timers = lock(&self.timers);
        for id in ids {
            if let Some(handle) = timers.remove(id) {
                handle.abort();
            }
        }
    }

    fn cancel_all_timers(&self) {
        for (_, handle) in lock(&self.timers).drain() {
            handle.abort();
        }
    }
}

fn evict_oldest(items: &mut Vec<Notification>, max_size: usize) -> Vec<NotificationId> {
    let excess = items.len().saturating_sub(max_size);
    items.drain(..excess).map(|n| n.id).collect()
}
