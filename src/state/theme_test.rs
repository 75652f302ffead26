use super::*;
use crate::persist::MemoryStorage;
use std::sync::atomic::{AtomicUsize, Ordering};

fn store(system: ColorScheme) -> (ThemeStore, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    (ThemeStore::new(storage.clone(), system), storage)
}

#[derive(Default)]
struct CountingApplier {
    calls: AtomicUsize,
    last: Mutex<Option<ColorScheme>>,
}

impl ThemeApplier for CountingApplier {
    fn apply(&self, scheme: ColorScheme) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(scheme);
    }
}

// =========================================================================
// resolve
// =========================================================================

#[test]
fn resolve_uses_system_only_in_system_mode() {
    assert_eq!(resolve(ThemeMode::System, ColorScheme::Dark), ColorScheme::Dark);
    assert_eq!(resolve(ThemeMode::System, ColorScheme::Light), ColorScheme::Light);
    assert_eq!(resolve(ThemeMode::Light, ColorScheme::Dark), ColorScheme::Light);
    assert_eq!(resolve(ThemeMode::Dark, ColorScheme::Light), ColorScheme::Dark);
}

// =========================================================================
// store
// =========================================================================

#[test]
fn system_mode_follows_system_scheme() {
    let (theme, _) = store(ColorScheme::Light);
    let effective = theme.effective();
    theme.set_system_scheme(ColorScheme::Dark);
    assert_eq!(effective.get(), ColorScheme::Dark);
}

#[test]
fn explicit_mode_ignores_system_changes() {
    let (theme, _) = store(ColorScheme::Light);
    theme.set_mode(ThemeMode::Light);
    theme.set_system_scheme(ColorScheme::Dark);
    assert_eq!(theme.effective_scheme(), ColorScheme::Light);
}

#[test]
fn toggle_from_system_dark_persists_explicit_light() {
    let (theme, storage) = store(ColorScheme::Dark);
    assert_eq!(theme.effective_scheme(), ColorScheme::Dark);

    assert_eq!(theme.toggle(), ColorScheme::Light);

    assert_eq!(theme.mode(), ThemeMode::Light);
    assert_eq!(storage.snapshot()[THEME_KEY], "light");
    assert_eq!(theme.toggle(), ColorScheme::Dark);
    assert_eq!(storage.snapshot()[THEME_KEY], "dark");
}

#[test]
fn hydrate_reads_explicit_choice() {
    let storage = Arc::new(MemoryStorage::with_entries([(THEME_KEY, "dark")]));
    let theme = ThemeStore::new(storage, ColorScheme::Light);
    assert!(theme.hydrate());
    assert_eq!(theme.effective_scheme(), ColorScheme::Dark);
}

#[test]
fn hydrate_ignores_unknown_value() {
    let storage = Arc::new(MemoryStorage::with_entries([(THEME_KEY, "sepia")]));
    let theme = ThemeStore::new(storage, ColorScheme::Light);
    assert!(!theme.hydrate());
    assert_eq!(theme.mode(), ThemeMode::System);
}

#[test]
fn palette_and_is_dark_track_effective() {
    let (theme, _) = store(ColorScheme::Light);
    let palette = theme.palette();
    let dark = theme.is_dark();
    assert_eq!(palette.get().background, "#ffffff");

    theme.set_mode(ThemeMode::Dark);
    assert!(dark.get());
    assert_eq!(palette.get(), ThemePalette::for_scheme(ColorScheme::Dark));
    assert_eq!(palette.get().primary, "#3b82f6");
}

#[test]
fn attach_applies_current_and_subsequent_schemes() {
    let (theme, _) = store(ColorScheme::Light);
    let applier = Arc::new(CountingApplier::default());
    let _sub = theme.attach(applier.clone());
    assert_eq!(*applier.last.lock().unwrap(), Some(ColorScheme::Light));

    theme.set_mode(ThemeMode::Dark);
    assert_eq!(*applier.last.lock().unwrap(), Some(ColorScheme::Dark));
    assert_eq!(applier.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn unchanged_system_report_is_not_rebroadcast() {
    let (theme, _) = store(ColorScheme::Dark);
    let applier = Arc::new(CountingApplier::default());
    let _sub = theme.attach(applier.clone());
    theme.set_system_scheme(ColorScheme::Dark);
    assert_eq!(applier.calls.load(Ordering::SeqCst), 1);
}

// =========================================================================
// DocumentTheme
// =========================================================================

#[test]
fn document_theme_sets_attribute_class_and_meta() {
    let doc = DocumentTheme::new();
    doc.apply(ColorScheme::Dark);

    let root = doc.snapshot();
    assert_eq!(root.data_theme.as_deref(), Some("dark"));
    assert!(root.classes.contains("dark"));
    assert!(!root.classes.contains("light"));
    assert_eq!(root.theme_color.as_deref(), Some("#1a1a1a"));
}

#[test]
fn document_theme_apply_is_idempotent() {
    let doc = DocumentTheme::new();
    doc.apply(ColorScheme::Light);
    let once = doc.snapshot();
    doc.apply(ColorScheme::Light);
    assert_eq!(doc.snapshot(), once);

    doc.apply(ColorScheme::Dark);
    doc.apply(ColorScheme::Light);
    assert_eq!(doc.snapshot(), once);
}
