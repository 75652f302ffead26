use super::*;

#[test]
fn app_state_defaults() {
    let state = AppState::default();
    assert!(!state.sidebar_open);
    assert_eq!(state.pending_requests, 0);
    assert!(!state.is_loading());
}

#[test]
fn toggle_sidebar_flips() {
    let app = AppStore::new();
    let open = app.sidebar_open();
    app.toggle_sidebar();
    assert!(open.get());
    app.toggle_sidebar();
    assert!(!open.get());
    app.set_sidebar_open(true);
    assert!(app.get().sidebar_open);
}

#[test]
fn loading_tracks_overlapping_requests() {
    let app = AppStore::new();
    let loading = app.is_loading();

    let first = app.begin_request();
    let second = app.begin_request();
    assert!(loading.get());

    drop(first);
    assert!(loading.get());
    assert_eq!(app.get().pending_requests, 1);

    drop(second);
    assert!(!loading.get());
}
