//! Uniform error shape for transport, HTTP and validation failures.
//!
//! DESIGN
//! ======
//! Every failed request resolves to an `ApiError`. Each variant can be
//! flattened into a `NormalizedError` (the user-facing message plus whatever
//! the server told us), which is what stores keep in their `error` fields and
//! what the notification pipeline displays.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

pub const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred";
pub const NETWORK_MESSAGE: &str = "Network error. Please check your connection and try again.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";

/// Human-readable default for an HTTP status, if the status is in the table.
#[must_use]
pub fn status_message(status: u16) -> Option<&'static str> {
    match status {
        400 => Some("Invalid request"),
        401 => Some("Authentication required"),
        403 => Some("Access denied"),
        404 => Some("Resource not found"),
        409 => Some("Conflict occurred"),
        422 => Some("Validation failed"),
        429 => Some("Too many requests"),
        500 => Some("Internal server error"),
        502..=504 => Some("Service temporarily unavailable"),
        _ => None,
    }
}

// =============================================================================
// NORMALIZED ERROR
// =============================================================================

/// The user-facing view of a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedError {
    pub user_message: String,
    pub http_status: Option<u16>,
    pub code: Option<String>,
    pub details: Option<Value>,
}

impl NormalizedError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self { user_message: message.into(), http_status: None, code: None, details: None }
    }
}

impl fmt::Display for NormalizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message)
    }
}

// =============================================================================
// API ERROR
// =============================================================================

/// Field name to the messages reported for it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// No response was received.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The server answered with a status of 400 or above.
    #[error("{0}")]
    Http(NormalizedError),

    /// The server rejected specific fields.
    #[error("{error}")]
    Validation { error: NormalizedError, fields: FieldErrors },

    /// An authenticated request was answered with 401.
    #[error("{0}")]
    SessionExpired(NormalizedError),

    /// A body could not be encoded, or the response body was not what we
    /// expected.
    #[error("body codec failed: {0}")]
    Decode(String),

    /// A newer session action made this result irrelevant.
    #[error("request superseded by a newer session action")]
    Superseded,
}

impl ApiError {
    /// Build the error for a non-success response.
    ///
    /// `body` is whatever the server sent; JSON envelopes contribute their
    /// `message`/`error`, `code` and `details`, plain text becomes the message.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let mut error = NormalizedError {
            user_message: String::new(),
            http_status: Some(status),
            code: None,
            details: None,
        };
        let mut server_message = None;

        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => {
                server_message = ["message", "error"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str))
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_owned);
                error.code = map.get("code").and_then(Value::as_str).map(str::to_owned);
                error.details = map.get("details").filter(|d| !d.is_null()).cloned();
            }
            Ok(Value::String(text)) if !text.trim().is_empty() => server_message = Some(text),
            Ok(_) => {}
            Err(_) => {
                let text = body.trim();
                if !text.is_empty() && !text.starts_with('<') {
                    server_message = Some(text.to_owned());
                }
            }
        }

        error.user_message = server_message
            .or_else(|| status_message(status).map(str::to_owned))
            .unwrap_or_else(|| UNEXPECTED_MESSAGE.to_owned());

        if (400..500).contains(&status) && status != 401 && status != 429 {
            if let Some(fields) = error.details.as_ref().and_then(field_errors) {
                return Self::Validation { error, fields };
            }
        }
        Self::Http(error)
    }

    /// Re-tag an HTTP failure as the end of the session.
    #[must_use]
    pub fn into_session_expired(self) -> Self {
        match self {
            Self::Http(error) | Self::Validation { error, .. } => Self::SessionExpired(error),
            other => other,
        }
    }

    /// Flatten into the user-facing shape.
    #[must_use]
    pub fn normalized(&self) -> NormalizedError {
        match self {
            Self::Transport { .. } => NormalizedError::message(NETWORK_MESSAGE),
            Self::Http(error) | Self::Validation { error, .. } | Self::SessionExpired(error) => error.clone(),
            Self::Decode(_) => NormalizedError::message(UNEXPECTED_MESSAGE),
            Self::Superseded => NormalizedError::message("Request was superseded"),
        }
    }

    /// Message suitable for a store's `error` field.
    #[must_use]
    pub fn user_message(&self) -> String {
        self.normalized().user_message
    }

    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http(error) | Self::Validation { error, .. } | Self::SessionExpired(error) => error.http_status,
            _ => None,
        }
    }

    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "E_TRANSPORT",
            Self::Http(_) => "E_HTTP",
            Self::Validation { .. } => "E_VALIDATION",
            Self::SessionExpired(_) => "E_SESSION_EXPIRED",
            Self::Decode(_) => "E_DECODE",
            Self::Superseded => "E_SUPERSEDED",
        }
    }

    /// Transport failures, rate limiting and 5xx responses may succeed later.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Http(error) => matches!(error.http_status, Some(429 | 500..=599)),
            _ => false,
        }
    }
}

/// Extract field-level messages from a `details` payload.
///
/// Accepts the server's `[{field, message}]` list as well as a
/// `{field: [messages]}` / `{field: message}` map.
#[must_use]
pub fn field_errors(details: &Value) -> Option<FieldErrors> {
    let mut fields = FieldErrors::new();
    match details {
        Value::Array(items) => {
            for item in items {
                let field = item.get("field").and_then(Value::as_str)?;
                let message = item.get("message").and_then(Value::as_str).unwrap_or("is invalid");
                fields
                    .entry(field.to_owned())
                    .or_default()
                    .push(message.to_owned());
            }
        }
        Value::Object(map) => {
            for (field, messages) in map {
                let messages: Vec<String> = match messages {
                    Value::String(s) => vec![s.clone()],
                    Value::Array(list) => list
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_owned)
                        .collect(),
                    _ => return None,
                };
                fields.insert(field.clone(), messages);
            }
        }
        _ => return None,
    }
    if fields.is_empty() { None } else { Some(fields) }
}
