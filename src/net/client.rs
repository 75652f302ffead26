//! JSON API client: auth header injection, envelope unwrapping, error
//! normalization and retry.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every store talks to the backend through one shared `ApiClient`. The
//! client reads the bearer token through `SessionGate` at send time and
//! calls back into it when an authenticated request is answered with 401,
//! which keeps the auth store and the client from owning each other.
//!
//! ERROR HANDLING
//! ==============
//! Failures are reported through the injected `ErrorHandler` once per call
//! (after retries are exhausted), then returned to the caller unchanged.

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::transport::{HttpRequest, HttpResponse, Method, Transport, UploadFile, UploadProgress, UploadRequest};
use super::types::ApiEnvelope;
use crate::error::ApiError;
use crate::error_handler::{ErrorHandler, ReportOptions};
use crate::retry::{RetryPolicy, retry};
use crate::state::app::AppStore;

/// The client's view of the auth session.
pub trait SessionGate: Send + Sync {
    /// Token to send as `Authorization: Bearer`, if signed in.
    fn bearer_token(&self) -> Option<String>;

    /// The server rejected `token`. Implementations end the session only if
    /// `token` is still the current one.
    fn expire(&self, token: &str);
}

/// Which bearer token a request carries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Credential {
    /// The session's current token. A 401 ends the session.
    #[default]
    Session,
    /// No `Authorization` header.
    Anonymous,
    /// This exact token. A 401 is an ordinary HTTP error.
    Bearer(String),
}

/// Per-request behaviour.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestOptions {
    /// Push an error notification on failure. Session expiry always notifies.
    pub notify: bool,
    /// Retry policy for retryable failures; `None` sends once.
    pub retry: Option<RetryPolicy>,
    pub credential: Credential,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self { notify: true, retry: None, credential: Credential::Session }
    }
}

impl RequestOptions {
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.notify = false;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    #[must_use]
    pub fn no_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    /// Send without any bearer token.
    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.credential = Credential::Anonymous;
        self
    }

    /// Send with `token` instead of the session's.
    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.credential = Credential::Bearer(token.into());
        self
    }
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Option<Arc<dyn SessionGate>>,
    errors: ErrorHandler,
    app: Option<AppStore>,
    retry: RetryPolicy,
}

impl ApiClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, errors: ErrorHandler) -> Self {
        Self { transport, session: None, errors, app: None, retry: RetryPolicy::none() }
    }

    /// Attach the session that supplies tokens and handles expiry.
    #[must_use]
    pub fn with_session(mut self, session: Arc<dyn SessionGate>) -> Self {
        self.session = Some(session);
        self
    }

    /// Count in-flight requests in `app`'s loading indicator.
    #[must_use]
    pub fn with_app(mut self, app: AppStore) -> Self {
        self.app = Some(app);
        self
    }

    /// Policy applied to idempotent requests by default.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Default options for `method`: GET, HEAD and DELETE retry with the
    /// configured policy, everything else sends once.
    #[must_use]
    pub fn options_for(&self, method: &Method) -> RequestOptions {
        let idempotent = *method == Method::GET || *method == Method::HEAD || *method == Method::DELETE;
        RequestOptions { retry: idempotent.then_some(self.retry), ..RequestOptions::default() }
    }

    pub fn errors(&self) -> &ErrorHandler {
        &self.errors
    }

    /// Send a request and decode the envelope's `data` as `T`.
    ///
    /// # Errors
    ///
    /// Returns the normalized failure after it has been reported.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.execute(method, path, &[], body, options).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::GET, path, &[], None, self.options_for(&Method::GET)).await
    }

    /// GET with query parameters.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get_query<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ApiError> {
        self.execute(Method::GET, path, query, None, self.options_for(&Method::GET)).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send_json(Method::POST, path, body).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send_json(Method::PUT, path, body).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send_json(Method::PATCH, path, body).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::DELETE, path, &[], None, self.options_for(&Method::DELETE)).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let options = self.options_for(&method);
        let body = encode_body(body).map_err(|e| {
            self.errors.report(&e, ReportOptions { notify: options.notify, log: true });
            e
        })?;
        self.execute(method, path, &[], Some(body), options).await
    }

    /// Multipart `POST` of one file under the `file` field.
    ///
    /// `progress` receives the percentage of the body sent so far. Uploads
    /// are never retried.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        file: UploadFile,
        progress: Option<UploadProgress>,
    ) -> Result<T, ApiError> {
        let _in_flight = self.app.as_ref().map(AppStore::begin_request);
        let options = self.options_for(&Method::POST);
        let bearer = self.bearer(&options.credential);

        let mut request = UploadRequest::new(path, file);
        if let Some(bearer) = &bearer {
            request.headers.push(("Authorization".to_owned(), format!("Bearer {}", bearer.token)));
        }
        let size = request.file.bytes.len();

        let result = match self.transport.upload(request, progress).await {
            Ok(response) => {
                tracing::debug!(path, size, status = response.status, "upload response");
                self.classify(&response, bearer.as_ref())
            }
            Err(e) => Err(ApiError::Transport { message: e.to_string() }),
        };
        result.map_err(|e| {
            self.errors.report(&e, ReportOptions { notify: options.notify, log: true });
            e
        })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let _in_flight = self.app.as_ref().map(AppStore::begin_request);
        let policy = options.retry.unwrap_or_else(RetryPolicy::none);

        let result = retry(policy, || {
            self.exchange(method.clone(), path, query, body.as_ref(), &options.credential)
        })
        .await;
        result.map_err(|e| {
            self.errors.report(&e, ReportOptions { notify: options.notify, log: true });
            e
        })
    }

    /// One attempt: send, then classify the response.
    async fn exchange<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        credential: &Credential,
    ) -> Result<T, ApiError> {
        let bearer = self.bearer(credential);

        let mut request = HttpRequest::new(method, path);
        request.query = query.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        request.headers.push(("Content-Type".to_owned(), "application/json".to_owned()));
        if let Some(bearer) = &bearer {
            request.headers.push(("Authorization".to_owned(), format!("Bearer {}", bearer.token)));
        }
        request.body = body.cloned();

        let method = request.method.clone();
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ApiError::Transport { message: e.to_string() })?;
        tracing::debug!(%method, path, status = response.status, "api response");
        self.classify(&response, bearer.as_ref())
    }

    /// Resolve the token to send. Read at send time so retries pick up
    /// a session that changed in between.
    fn bearer(&self, credential: &Credential) -> Option<Bearer> {
        match credential {
            Credential::Session => self
                .session
                .as_ref()
                .and_then(|s| s.bearer_token())
                .map(|token| Bearer { token, from_session: true }),
            Credential::Anonymous => None,
            Credential::Bearer(token) => Some(Bearer { token: token.clone(), from_session: false }),
        }
    }

    fn classify<T: DeserializeOwned>(&self, response: &HttpResponse, bearer: Option<&Bearer>) -> Result<T, ApiError> {
        if response.is_success() {
            return decode_body(response.status, &response.body);
        }
        let error = ApiError::from_response(response.status, &response.body);
        if response.status == 401 {
            if let (Some(Bearer { token, from_session: true }), Some(session)) = (bearer, &self.session) {
                session.expire(token);
                return Err(error.into_session_expired());
            }
        }
        Err(error)
    }
}

struct Bearer {
    token: String,
    from_session: bool,
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Unwrap `{success, data}` if present, else decode the body as-is. An empty
/// body decodes from `null`.
fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ApiError> {
    let value: Value = if body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?
    };

    let payload = match value {
        Value::Object(map) if map.contains_key("success") => {
            let envelope: ApiEnvelope<Value> =
                serde_json::from_value(Value::Object(map)).map_err(|e| ApiError::Decode(e.to_string()))?;
            if !envelope.success {
                return Err(ApiError::from_response(status, body));
            }
            envelope.data.unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_json::from_value(payload).map_err(|e| ApiError::Decode(e.to_string()))
}
