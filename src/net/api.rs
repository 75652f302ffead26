//! Typed helpers for the backend's REST endpoints.
//!
//! Login and registration are sent quietly and without a bearer token:
//! their failures belong in the auth store's `error` field, next to the form
//! that caused them, and a rejected password must not read as an expired
//! session.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use super::client::ApiClient;
use super::transport::Method;
use super::types::{AuthPayload, Credentials, HealthStatus, ProfilePatch, UserProfile};
use crate::error::ApiError;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const PROFILE_PATH: &str = "/auth/profile";
pub const HEALTH_PATH: &str = "/health";

/// `POST /auth/login`.
///
/// # Errors
///
/// Returns the normalized failure; bad credentials surface as HTTP 401.
pub async fn login(client: &ApiClient, username: &str, password: &str) -> Result<AuthPayload, ApiError> {
    let credentials = Credentials { username: username.to_owned(), password: password.to_owned(), email: None };
    send_credentials(client, LOGIN_PATH, &credentials).await
}

/// `POST /auth/register`.
///
/// # Errors
///
/// Returns the normalized failure; rejected fields surface as
/// `ApiError::Validation`.
pub async fn register(
    client: &ApiClient,
    username: &str,
    password: &str,
    email: Option<&str>,
) -> Result<AuthPayload, ApiError> {
    let credentials = Credentials {
        username: username.to_owned(),
        password: password.to_owned(),
        email: email.map(str::to_owned),
    };
    send_credentials(client, REGISTER_PATH, &credentials).await
}

async fn send_credentials(client: &ApiClient, path: &str, credentials: &Credentials) -> Result<AuthPayload, ApiError> {
    let body = serde_json::to_value(credentials).map_err(|e| ApiError::Decode(e.to_string()))?;
    let options = client.options_for(&Method::POST).quiet().anonymous();
    client.request(Method::POST, path, Some(body), options).await
}

/// `GET /auth/profile`.
///
/// # Errors
///
/// Returns the normalized failure.
pub async fn profile(client: &ApiClient) -> Result<UserProfile, ApiError> {
    client.get(PROFILE_PATH).await
}

/// `GET /auth/profile`, sent exactly once whatever the client's retry policy.
///
/// # Errors
///
/// Returns the normalized failure.
pub async fn verify_profile(client: &ApiClient) -> Result<UserProfile, ApiError> {
    let options = client.options_for(&Method::GET).no_retry();
    client.request(Method::GET, PROFILE_PATH, None, options).await
}

/// `PUT /auth/profile`. Returns the server's updated profile.
///
/// # Errors
///
/// Returns the normalized failure.
pub async fn update_profile(client: &ApiClient, patch: &ProfilePatch) -> Result<UserProfile, ApiError> {
    client.put(PROFILE_PATH, patch).await
}

/// `POST /auth/logout` on behalf of `token`, which the caller has already
/// dropped locally. Failures, including a 401, are not surfaced to the user.
///
/// # Errors
///
/// Returns the normalized failure.
pub async fn logout(client: &ApiClient, token: &str) -> Result<(), ApiError> {
    let options = client.options_for(&Method::POST).quiet().with_bearer(token);
    client.request(Method::POST, LOGOUT_PATH, None, options).await
}

/// `GET /health`.
///
/// # Errors
///
/// Returns the normalized failure.
pub async fn health(client: &ApiClient) -> Result<HealthStatus, ApiError> {
    client.get(HEALTH_PATH).await
}
