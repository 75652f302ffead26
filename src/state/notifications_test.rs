use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

fn config(max_size: usize) -> NotificationConfig {
    NotificationConfig {
        max_size,
        default_duration: Duration::from_millis(5000),
        sweep_interval: Duration::from_secs(300),
        retention: Duration::from_secs(3600),
    }
}

fn titles(queue: &NotificationQueue) -> Vec<String> {
    queue.items().into_iter().map(|n| n.title).collect()
}

// =============================================================
// add / ordering / eviction
// =============================================================

#[tokio::test]
async fn add_assigns_unique_ids_in_insertion_order() {
    let queue = NotificationQueue::new(&config(5));
    let a = queue.info("a", "");
    let b = queue.info("b", "");

    assert_ne!(a, b);
    assert_eq!(titles(&queue), vec!["a", "b"]);
}

#[tokio::test]
async fn inserting_past_bound_evicts_oldest_first() {
    let queue = NotificationQueue::new(&config(3));
    for title in ["1", "2", "3", "4"] {
        queue.info(title, "");
    }

    assert_eq!(queue.len(), 3);
    assert_eq!(titles(&queue), vec!["2", "3", "4"]);
}

#[tokio::test]
async fn set_max_size_evicts_immediately() {
    let queue = NotificationQueue::new(&config(5));
    for title in ["1", "2", "3", "4"] {
        queue.info(title, "");
    }
    queue.set_max_size(2);

    assert_eq!(titles(&queue), vec!["3", "4"]);
    assert_eq!(queue.max_size(), 2);
}

#[tokio::test]
async fn max_size_is_at_least_one() {
    let queue = NotificationQueue::new(&config(0));
    queue.info("only", "");
    assert_eq!(queue.len(), 1);
}

// =============================================================
// expiry defaults
// =============================================================

#[test]
fn info_defaults_to_configured_duration() {
    let n = NewNotification::info("x");
    assert_eq!(n.expiry(Duration::from_millis(5000)), Expiry::After(Duration::from_millis(5000)));
}

#[test]
fn error_defaults_to_persistent() {
    assert_eq!(NewNotification::error("x").expiry(Duration::from_secs(5)), Expiry::Never);
}

#[test]
fn error_can_opt_out_of_persistence() {
    let n = NewNotification::error("x").persistent(false).duration(Duration::from_secs(2));
    assert_eq!(n.expiry(Duration::from_secs(5)), Expiry::After(Duration::from_secs(2)));
}

#[test]
fn zero_duration_never_expires() {
    let n = NewNotification::success("x").duration(Duration::ZERO);
    assert_eq!(n.expiry(Duration::from_secs(5)), Expiry::Never);
}

#[test]
fn persistent_flag_overrides_duration() {
    let n = NewNotification::warning("x").duration(Duration::from_secs(1)).persistent(true);
    assert_eq!(n.expiry(Duration::from_secs(5)), Expiry::Never);
}

// =============================================================
// auto-dismiss timers
// =============================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn short_timers_never_outlive_their_notification() {
    let queue = NotificationQueue::new(&config(200));
    for i in 0..100 {
        queue.add(NewNotification::info(format!("n{i}")).duration(Duration::from_millis(1)));
    }

    for _ in 0..200 {
        if queue.is_empty() && lock(&queue.timers).is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(queue.is_empty());
    assert!(lock(&queue.timers).is_empty());
}

#[tokio::test(start_paused = true)]
async fn timed_notification_is_dismissed_after_duration() {
    let queue = NotificationQueue::new(&config(5));
    let id = queue.add(NewNotification::info("bye").duration(Duration::from_millis(300)));

    tokio::time::sleep(Duration::from_millis(299)).await;
    assert!(queue.get(id).is_some());

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(queue.get(id).is_none());
}

#[tokio::test(start_paused = true)]
async fn persistent_and_zero_duration_entries_never_auto_dismiss() {
    let queue = NotificationQueue::new(&config(5));
    let err = queue.error("failed", "details");
    let zero = queue.add(NewNotification::info("sticky").duration(Duration::ZERO));
    let flagged = queue.add(NewNotification::success("kept").persistent(true));

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(queue.get(err).is_some());
    assert!(queue.get(zero).is_some());
    assert!(queue.get(flagged).is_some());
}

#[tokio::test(start_paused = true)]
async fn manual_dismiss_cancels_timer() {
    let queue = NotificationQueue::new(&config(5));
    let id = queue.info("x", "");
    assert!(queue.dismiss(id));
    assert!(!queue.dismiss(id));

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    let _sub = queue.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    tokio::time::sleep(Duration::from_secs(10)).await;

    // Only the immediate call on subscribe; the aborted timer never fired.
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert!(lock(&queue.timers).is_empty());
}

#[tokio::test(start_paused = true)]
async fn dismiss_all_clears_entries_and_timers() {
    let queue = NotificationQueue::new(&config(5));
    queue.info("a", "");
    queue.error("b", "");
    queue.dismiss_all();

    assert!(queue.is_empty());
    assert!(lock(&queue.timers).is_empty());
}

#[tokio::test(start_paused = true)]
async fn evicted_entries_lose_their_timers() {
    let queue = NotificationQueue::new(&config(1));
    queue.info("a", "");
    queue.info("b", "");

    assert_eq!(lock(&queue.timers).len(), 1);
}

#[test]
fn add_without_runtime_keeps_entry_and_skips_timer() {
    let queue = NotificationQueue::new(&config(5));
    let id = queue.info("no runtime", "");
    assert!(queue.get(id).is_some());
    assert!(lock(&queue.timers).is_empty());
}

// =============================================================
// sweep
// =============================================================

#[tokio::test(start_paused = true)]
async fn sweep_purges_entries_older_than_retention() {
    let queue = NotificationQueue::new(&config(5));
    let old = queue.error("old", "");
    tokio::time::advance(Duration::from_secs(3000)).await;
    let fresh = queue.error("fresh", "");
    tokio::time::advance(Duration::from_secs(700)).await;

    let removed = queue.sweep_expired(Instant::now(), Duration::from_secs(3600));

    assert_eq!(removed, 1);
    assert!(queue.get(old).is_none());
    assert!(queue.get(fresh).is_some());
}

#[tokio::test(start_paused = true)]
async fn sweep_task_runs_periodically() {
    let queue = NotificationQueue::new(&config(5));
    let id = queue.error("leaked", "");
    let task = queue.spawn_sweep_task(Duration::from_secs(60), Duration::from_secs(90));

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(queue.get(id).is_some());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(queue.get(id).is_none());

    task.abort();
}

// =============================================================
// misc operations
// =============================================================

#[tokio::test]
async fn update_edits_in_place() {
    let queue = NotificationQueue::new(&config(5));
    let id = queue.info("uploading", "0%");
    assert!(queue.update(id, |n| n.message = "100%".into()));
    assert_eq!(queue.get(id).unwrap().message, "100%");
    assert!(!queue.update(Uuid::new_v4(), |_| {}));
}

#[tokio::test]
async fn run_action_invokes_effect() {
    let queue = NotificationQueue::new(&config(5));
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let id = queue.add(NewNotification::warning("unsaved").action(NotificationAction::new(
        "Retry",
        ActionVariant::Primary,
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        },
    )));

    assert!(queue.run_action(id, 0));
    assert!(!queue.run_action(id, 1));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn by_kind_filters_and_count_tracks_length() {
    let queue = NotificationQueue::new(&config(5));
    let count = queue.count();
    queue.info("a", "");
    queue.error("b", "");
    queue.error("c", "");

    assert_eq!(queue.by_kind(NotificationKind::Error).len(), 2);
    assert_eq!(count.get(), 3);
}

#[test]
fn position_defaults_to_top_right_and_is_settable() {
    let queue = NotificationQueue::new(&config(5));
    assert_eq!(queue.position(), Position::TopRight);
    queue.set_position(Position::BottomCenter);
    assert_eq!(queue.position(), Position::BottomCenter);
}

#[test]
fn kind_icons_are_distinct() {
    let icons = [
        NotificationKind::Success.icon(),
        NotificationKind::Error.icon(),
        NotificationKind::Warning.icon(),
        NotificationKind::Info.icon(),
    ];
    for (i, a) in icons.iter().enumerate() {
        for b in &icons[i + 1..] {
            assert_ne!(a, b);
        }
    }
}
