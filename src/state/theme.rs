//! Light/dark theme resolution.
//!
//! DESIGN
//! ======
//! Two sources, one derived value: the chosen `ThemeMode` and the
//! system-reported `ColorScheme` feed `effective`, which is what the host
//! renders. Applying `effective` to the page goes through `ThemeApplier`,
//! whose implementations must be idempotent.
//!
//! Only an explicit choice (`set_mode`, `toggle`) is persisted; the system
//! scheme is re-reported by the host on every start.

#[cfg(test)]
#[path = "theme_test.rs"]
mod theme_test;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::net::types::ThemeMode;
use crate::persist::{self, KeyValueStore, THEME_KEY};
use crate::store::{Derived, Store, Subscription, derived, derived2, lock};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

impl ColorScheme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl From<ColorScheme> for ThemeMode {
    fn from(scheme: ColorScheme) -> Self {
        match scheme {
            ColorScheme::Light => Self::Light,
            ColorScheme::Dark => Self::Dark,
        }
    }
}

/// The scheme to render for `mode` when the system reports `system`.
#[must_use]
pub fn resolve(mode: ThemeMode, system: ColorScheme) -> ColorScheme {
    match mode {
        ThemeMode::Light => ColorScheme::Light,
        ThemeMode::Dark => ColorScheme::Dark,
        ThemeMode::System => system,
    }
}

/// Colours for one scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThemePalette {
    pub primary: &'static str,
    pub background: &'static str,
    pub surface: &'static str,
    pub text: &'static str,
    pub text_secondary: &'static str,
    pub border: &'static str,
}

impl ThemePalette {
    #[must_use]
    pub fn for_scheme(scheme: ColorScheme) -> Self {
        match scheme {
            ColorScheme::Dark => Self {
                primary: "#3b82f6",
                background: "#1a1a1a",
                surface: "#2a2a2a",
                text: "#ffffff",
                text_secondary: "#a1a1aa",
                border: "#3a3a3a",
            },
            ColorScheme::Light => Self {
                primary: "#2563eb",
                background: "#ffffff",
                surface: "#f8fafc",
                text: "#1a1a1a",
                text_secondary: "#6b7280",
                border: "#e5e7eb",
            },
        }
    }
}

// =============================================================================
// APPLIER
// =============================================================================

/// Applies a scheme to whatever the host renders into.
pub trait ThemeApplier: Send + Sync {
    /// Applying the same scheme twice must leave the same state as once.
    fn apply(&self, scheme: ColorScheme);
}

/// Observable root-element state written by `DocumentTheme`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentState {
    pub data_theme: Option<String>,
    pub classes: BTreeSet<String>,
    /// `<meta name="theme-color">` content.
    pub theme_color: Option<String>,
}

/// In-process model of the document root: `data-theme`, the `light`/`dark`
/// class and the `theme-color` meta tag.
#[derive(Debug, Default)]
pub struct DocumentTheme {
    root: Mutex<DocumentState>,
}

impl DocumentTheme {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> DocumentState {
        lock(&self.root).clone()
    }
}

impl ThemeApplier for DocumentTheme {
    fn apply(&self, scheme: ColorScheme) {
        let mut root = lock(&self.root);
        root.classes.remove(ColorScheme::Light.as_str());
        root.classes.remove(ColorScheme::Dark.as_str());
        root.classes.insert(scheme.as_str().to_owned());
        root.data_theme = Some(scheme.as_str().to_owned());
        root.theme_color = Some(ThemePalette::for_scheme(scheme).background.to_owned());
    }
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Clone)]
pub struct ThemeStore {
    mode: Store<ThemeMode>,
    system: Store<ColorScheme>,
    effective: Derived<ColorScheme>,
    storage: Arc<dyn KeyValueStore>,
}

impl ThemeStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, system: ColorScheme) -> Self {
        let mode = Store::new(ThemeMode::System);
        let system = Store::new(system);
        let effective = derived2(&mode, &system, |m: &ThemeMode, s: &ColorScheme| resolve(*m, *s));
        Self { mode, system, effective, storage }
    }

    /// Load the persisted explicit choice. Returns whether one was found.
    pub fn hydrate(&self) -> bool {
        let Some(raw) = persist::read(self.storage.as_ref(), THEME_KEY) else {
            return false;
        };
        match ThemeMode::parse(&raw) {
            Some(mode) => {
                self.mode.set(mode);
                true
            }
            None => {
                tracing::warn!(value = %raw, "ignoring unknown stored theme");
                false
            }
        }
    }

    #[must_use]
    pub fn mode(&self) -> ThemeMode {
        self.mode.get()
    }

    #[must_use]
    pub fn system_scheme(&self) -> ColorScheme {
        self.system.get()
    }

    #[must_use]
    pub fn effective_scheme(&self) -> ColorScheme {
        self.effective.get()
    }

    /// Choose a mode and persist it.
    pub fn set_mode(&self, mode: ThemeMode) {
        persist::write(self.storage.as_ref(), THEME_KEY, mode.as_str());
        self.mode.set(mode);
    }

    /// Switch to the opposite of what is shown now, as an explicit choice.
    pub fn toggle(&self) -> ColorScheme {
        let next = self.effective.get().flipped();
        self.set_mode(next.into());
        next
    }

    /// Report a change of the system colour scheme.
    pub fn set_system_scheme(&self, scheme: ColorScheme) {
        if self.system.get() != scheme {
            self.system.set(scheme);
        }
    }

    #[must_use]
    pub fn effective(&self) -> Derived<ColorScheme> {
        self.effective.clone()
    }

    #[must_use]
    pub fn is_dark(&self) -> Derived<bool> {
        derived(&self.effective, |s: &ColorScheme| *s == ColorScheme::Dark)
    }

    #[must_use]
    pub fn palette(&self) -> Derived<ThemePalette> {
        derived(&self.effective, |s: &ColorScheme| ThemePalette::for_scheme(*s))
    }

    pub fn subscribe_mode<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&ThemeMode) + Send + Sync + 'static,
    {
        self.mode.subscribe(observer)
    }

    /// Apply the effective scheme now and on every change.
    pub fn attach(&self, applier: Arc<dyn ThemeApplier>) -> Subscription {
        self.effective.subscribe(move |scheme| applier.apply(*scheme))
    }
}
