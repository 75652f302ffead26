//! HTTP transport seam.
//!
//! `ApiClient` speaks to the network only through `Transport`, so tests can
//! script responses and hosts can swap in a browser fetch implementation.
//! `ReqwestTransport` is the native implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
pub use reqwest::Method;

use crate::config::HttpTimeouts;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP client build failed: {0}")]
    Build(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("request timed out")]
    Timeout,
}

/// A request relative to the API base URL.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path below the base URL, starting with `/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        Self { method, path: path.to_owned(), query: Vec::new(), headers: Vec::new(), body: None }
    }

    /// Value of the first header named `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of a completed exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A file to send as one multipart field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), content_type: None, bytes }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Multipart `POST` relative to the API base URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    pub path: String,
    pub headers: Vec<(String, String)>,
    /// Form field the file is sent under.
    pub field: String,
    pub file: UploadFile,
}

impl UploadRequest {
    #[must_use]
    pub fn new(path: &str, file: UploadFile) -> Self {
        Self { path: path.to_owned(), headers: Vec::new(), field: "file".to_owned(), file }
    }

    /// Value of the first header named `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Receives the percentage (0 to 100) of an upload body sent so far.
pub type UploadProgress = Arc<dyn Fn(f64) + Send + Sync>;

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Perform one HTTP exchange.
    ///
    /// # Errors
    ///
    /// Returns an error only when no response was received. HTTP error
    /// statuses are successful exchanges.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Perform one multipart upload, reporting progress as the body is sent.
    ///
    /// # Errors
    ///
    /// As for `send`.
    async fn upload(
        &self,
        request: UploadRequest,
        progress: Option<UploadProgress>,
    ) -> Result<HttpResponse, TransportError>;
}

// =============================================================================
// REQWEST
// =============================================================================

/// Upload bodies are streamed in chunks of this size; progress is reported
/// per chunk.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Build a transport rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(base_url: &str, timeouts: HttpTimeouts) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        read_response(builder).await
    }

    async fn upload(
        &self,
        request: UploadRequest,
        progress: Option<UploadProgress>,
    ) -> Result<HttpResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let UploadFile { file_name, content_type, bytes } = request.file;

        let total = bytes.len();
        let chunks: Vec<Vec<u8>> = bytes.chunks(UPLOAD_CHUNK_BYTES).map(<[u8]>::to_vec).collect();
        let mut sent = 0;
        let body = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len();
            if let Some(progress) = &progress {
                progress(percent(sent, total));
            }
            Ok::<_, std::io::Error>(chunk)
        }));

        let length = u64::try_from(total).map_err(|e| TransportError::Build(e.to_string()))?;
        let mut part = Part::stream_with_length(reqwest::Body::wrap_stream(body), length).file_name(file_name);
        if let Some(content_type) = content_type {
            part = part
                .mime_str(&content_type)
                .map_err(|e| TransportError::Build(e.to_string()))?;
        }

        let mut builder = self.http.post(&url).multipart(Form::new().part(request.field, part));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        read_response(builder).await
    }
}

async fn read_response(builder: reqwest::RequestBuilder) -> Result<HttpResponse, TransportError> {
    let response = builder.send().await.map_err(map_reqwest_error)?;
    let status = response.status().as_u16();
    let body = response.text().await.map_err(map_reqwest_error)?;
    Ok(HttpResponse { status, body })
}

#[allow(clippy::cast_precision_loss)]
fn percent(sent: usize, total: usize) -> f64 {
    if total == 0 { 100.0 } else { sent as f64 / total as f64 * 100.0 }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Request(e.to_string())
    }
}
