//! Central error reporting: logging plus user-facing notifications.
//!
//! DESIGN
//! ======
//! One `ErrorHandler` is built by `runtime::initialize` and handed to every
//! component that reports failures. It owns no state beyond the notification
//! queue it pushes to, so tests can build one around a private queue (or use
//! `ErrorHandler::silent`).

#[cfg(test)]
#[path = "error_handler_test.rs"]
mod error_handler_test;

use crate::error::{ApiError, FieldErrors, NETWORK_MESSAGE, NormalizedError, SESSION_EXPIRED_MESSAGE};
use crate::state::notifications::{NewNotification, NotificationQueue};

/// Per-call switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportOptions {
    pub notify: bool,
    pub log: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { notify: true, log: true }
    }
}

impl ReportOptions {
    #[must_use]
    pub fn quiet() -> Self {
        Self { notify: false, log: true }
    }
}

#[derive(Clone, Default)]
pub struct ErrorHandler {
    notifications: Option<NotificationQueue>,
}

impl ErrorHandler {
    #[must_use]
    pub fn new(notifications: NotificationQueue) -> Self {
        Self { notifications: Some(notifications) }
    }

    /// A handler that only logs.
    #[must_use]
    pub fn silent() -> Self {
        Self { notifications: None }
    }

    /// Log and surface a request failure. Returns its normalized form.
    ///
    /// Session expiry is always surfaced, whatever `options.notify` says.
    pub fn report(&self, error: &ApiError, options: ReportOptions) -> NormalizedError {
        let normalized = error.normalized();
        match error {
            ApiError::SessionExpired(_) => {
                if options.log {
                    tracing::warn!(status = ?normalized.http_status, "session expired");
                }
                self.push(NewNotification::error("Session expired").message(SESSION_EXPIRED_MESSAGE));
            }
            ApiError::Validation { fields, .. } => {
                self.handle_validation(fields, options);
            }
            ApiError::Transport { message } => {
                self.handle_network(message, options);
            }
            ApiError::Superseded => {
                tracing::debug!("dropping superseded response");
            }
            ApiError::Http(_) | ApiError::Decode(_) => {
                if options.log {
                    tracing::error!(
                        status = ?normalized.http_status,
                        code = error.error_code(),
                        server_code = ?normalized.code,
                        error = %error,
                        "API error"
                    );
                }
                if options.notify {
                    self.push(NewNotification::error("Error").message(&normalized.user_message));
                }
            }
        }
        normalized
    }

    /// Surface a free-form failure message.
    pub fn handle_message(&self, message: &str, options: ReportOptions) {
        if options.log {
            tracing::error!(error = message, "error");
        }
        if options.notify {
            self.push(NewNotification::error("Error").message(Self::friendly_message(message)));
        }
    }

    /// Surface field-level failures. Returns the message shown to the user.
    pub fn handle_validation(&self, fields: &FieldErrors, options: ReportOptions) -> String {
        let message = fields
            .values()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| "Validation failed".to_owned());
        if options.log {
            tracing::warn!(?fields, "validation error");
        }
        if options.notify {
            self.push(NewNotification::error("Validation failed").message(&message));
        }
        message
    }

    /// Surface a failure where no response arrived.
    pub fn handle_network(&self, detail: &str, options: ReportOptions) {
        if options.log {
            tracing::error!(error = detail, "network error");
        }
        if options.notify {
            self.push(NewNotification::error("Network error").message(NETWORK_MESSAGE));
        }
    }

    /// Map low-level failure strings to wording fit for end users.
    #[must_use]
    pub fn friendly_message(raw: &str) -> String {
        let friendly = match raw {
            "NetworkError when attempting to fetch resource." => "Network error. Please check your connection.",
            "Failed to fetch" => "Unable to connect to the server. Please try again.",
            "Request timeout" | "request timed out" => "Request timed out. Please try again.",
            "User denied the request" => "Permission denied. Please check your settings.",
            other => other,
        };
        friendly.to_owned()
    }

    fn push(&self, notification: NewNotification) {
        if let Some(queue) = &self.notifications {
            queue.add(notification);
        }
    }
}
