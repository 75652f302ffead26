//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_NOTIFICATION_MAX: usize = 5;
pub const DEFAULT_NOTIFICATION_DURATION_MS: u64 = 5000;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_RETENTION_SECS: u64 = 3600;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse failed: {0}")]
    Parse(String),
}

/// What to do with an optimistic preference merge when the server rejects it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreferenceSync {
    /// Keep the local merge and surface the error; the next profile fetch
    /// reconciles.
    #[default]
    KeepLocal,
    /// Restore the preferences held before the merge.
    Revert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationConfig {
    pub max_size: usize,
    pub default_duration: Duration,
    pub sweep_interval: Duration,
    pub retention: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeouts: HttpTimeouts,
    pub notifications: NotificationConfig,
    pub retry: RetryPolicy,
    pub preference_sync: PreferenceSync,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeouts: HttpTimeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
            notifications: NotificationConfig {
                max_size: DEFAULT_NOTIFICATION_MAX,
                default_duration: Duration::from_millis(DEFAULT_NOTIFICATION_DURATION_MS),
                sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
                retention: Duration::from_secs(DEFAULT_RETENTION_SECS),
            },
            retry: RetryPolicy {
                max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
                base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            },
            preference_sync: PreferenceSync::KeepLocal,
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional (defaults in parentheses):
    /// - `WEBSTATE_BASE_URL` (`http://localhost:8080/api`)
    /// - `WEBSTATE_REQUEST_TIMEOUT_SECS` (30), `WEBSTATE_CONNECT_TIMEOUT_SECS` (10)
    /// - `WEBSTATE_NOTIFICATION_MAX` (5), `WEBSTATE_NOTIFICATION_DURATION_MS` (5000)
    /// - `WEBSTATE_SWEEP_INTERVAL_SECS` (300), `WEBSTATE_RETENTION_SECS` (3600)
    /// - `WEBSTATE_RETRY_MAX_ATTEMPTS` (2), `WEBSTATE_RETRY_BASE_DELAY_MS` (1000)
    /// - `WEBSTATE_PREFERENCE_SYNC`: `keep_local` (default) or `revert`
    ///
    /// # Errors
    ///
    /// Returns an error if `WEBSTATE_PREFERENCE_SYNC` names an unknown policy.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `WEBSTATE_PREFERENCE_SYNC` names an unknown policy.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = normalize_base_url(&lookup("WEBSTATE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()));
        let preference_sync = parse_preference_sync(lookup("WEBSTATE_PREFERENCE_SYNC").as_deref())?;

        Ok(Self {
            base_url,
            timeouts: HttpTimeouts {
                request_secs: parse_or(&lookup, "WEBSTATE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                connect_secs: parse_or(&lookup, "WEBSTATE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            },
            notifications: NotificationConfig {
                max_size: parse_or(&lookup, "WEBSTATE_NOTIFICATION_MAX", DEFAULT_NOTIFICATION_MAX),
                default_duration: Duration::from_millis(parse_or(
                    &lookup,
                    "WEBSTATE_NOTIFICATION_DURATION_MS",
                    DEFAULT_NOTIFICATION_DURATION_MS,
                )),
                sweep_interval: Duration::from_secs(parse_or(
                    &lookup,
                    "WEBSTATE_SWEEP_INTERVAL_SECS",
                    DEFAULT_SWEEP_INTERVAL_SECS,
                )),
                retention: Duration::from_secs(parse_or(&lookup, "WEBSTATE_RETENTION_SECS", DEFAULT_RETENTION_SECS)),
            },
            retry: RetryPolicy {
                max_attempts: parse_or(&lookup, "WEBSTATE_RETRY_MAX_ATTEMPTS", DEFAULT_RETRY_MAX_ATTEMPTS),
                base_delay: Duration::from_millis(parse_or(
                    &lookup,
                    "WEBSTATE_RETRY_BASE_DELAY_MS",
                    DEFAULT_RETRY_BASE_DELAY_MS,
                )),
            },
            preference_sync,
        })
    }

    /// Override the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

fn parse_preference_sync(raw: Option<&str>) -> Result<PreferenceSync, ConfigError> {
    match raw.map(str::trim).unwrap_or("keep_local") {
        "keep_local" => Ok(PreferenceSync::KeepLocal),
        "revert" => Ok(PreferenceSync::Revert),
        other => Err(ConfigError::Parse(format!(
            "unknown WEBSTATE_PREFERENCE_SYNC '{other}' (expected 'keep_local' or 'revert')"
        ))),
    }
}
