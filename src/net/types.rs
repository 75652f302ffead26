//! Wire DTOs for the client/server boundary.
//!
//! DESIGN
//! ======
//! These types mirror the server's JSON so serde round-trips stay lossless.
//! Every response is wrapped in `ApiEnvelope`; non-2xx responses always
//! carry `success: false` plus a human-readable `error` or `message`.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{success, data?, error?, message?}` response wrapper.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: Option<String>,
    pub code: Option<String>,
    pub details: Option<Value>,
}

// =============================================================================
// AUTH
// =============================================================================

/// Identity kept in the auth session and persisted between runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
}

impl From<&UserProfile> for SessionUser {
    fn from(profile: &UserProfile) -> Self {
        Self { id: profile.id.clone(), username: profile.username.clone() }
    }
}

/// Body of `POST /auth/login` and `POST /auth/register`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// `data` of a successful login or registration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserProfile,
}

// =============================================================================
// PROFILE
// =============================================================================

/// Full profile returned by `GET /auth/profile`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, alias = "avatar", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

/// Body of `PUT /auth/profile`. Absent fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "avatar", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<PreferencesPatch>,
}

// =============================================================================
// PREFERENCES
// =============================================================================

/// Tri-state theme preference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemeMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    /// Parse the persisted representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// User preferences. Missing fields take their defaults when decoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    #[serde(rename = "theme")]
    pub theme_mode: ThemeMode,
    pub language: String,
    #[serde(rename = "notifications")]
    pub notifications_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self { theme_mode: ThemeMode::System, language: "en".to_owned(), notifications_enabled: true }
    }
}

impl Preferences {
    /// Copy with every field present in `patch` replaced.
    #[must_use]
    pub fn merged(&self, patch: &PreferencesPatch) -> Self {
        Self {
            theme_mode: patch.theme_mode.unwrap_or(self.theme_mode),
            language: patch.language.clone().unwrap_or_else(|| self.language.clone()),
            notifications_enabled: patch.notifications_enabled.unwrap_or(self.notifications_enabled),
        }
    }
}

/// Partial preference update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PreferencesPatch {
    #[serde(rename = "theme", skip_serializing_if = "Option::is_none")]
    pub theme_mode: Option<ThemeMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(rename = "notifications", skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
}

impl PreferencesPatch {
    #[must_use]
    pub fn theme(mode: ThemeMode) -> Self {
        Self { theme_mode: Some(mode), ..Self::default() }
    }
}

// =============================================================================
// HEALTH
// =============================================================================

/// `data` of `GET /health`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}
