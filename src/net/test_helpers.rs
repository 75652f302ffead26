//! Scripted transport and JSON fixtures shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::sync::Notify;

use super::transport::{HttpRequest, HttpResponse, Method, Transport, TransportError, UploadProgress, UploadRequest};

struct Reply {
    result: Result<HttpResponse, TransportError>,
    gate: Option<Arc<Notify>>,
}

/// Transport answering from per-route scripts and recording every request.
///
/// Each `(method, path)` route pops its replies in order; an unscripted
/// route answers 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<HttpRequest>>,
    uploads: Mutex<Vec<UploadRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, method: Method, path: &str, status: u16, body: &Value) {
        self.push(method, path, Ok(response(status, body)), None);
    }

    pub fn reply_raw(&self, method: Method, path: &str, status: u16, body: &str) {
        let result = Ok(HttpResponse { status, body: body.to_owned() });
        self.push(method, path, result, None);
    }

    /// Reply only after `gate` is notified.
    pub fn reply_after(&self, gate: Arc<Notify>, method: Method, path: &str, status: u16, body: &Value) {
        self.push(method, path, Ok(response(status, body)), Some(gate));
    }

    pub fn fail(&self, method: Method, path: &str, error: TransportError) {
        self.push(method, path, Err(error), None);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<UploadRequest> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.method == method && r.path == path)
            .count()
    }

    fn push(&self, method: Method, path: &str, result: Result<HttpResponse, TransportError>, gate: Option<Arc<Notify>>) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_owned()))
            .or_default()
            .push_back(Reply { result, gate });
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let key = (request.method.clone(), request.path.clone());
        self.requests.lock().unwrap().push(request);
        self.next_reply(key).await
    }

    /// Uploads answer from the `POST` script of their path and report the
    /// whole body as sent in one step.
    async fn upload(
        &self,
        request: UploadRequest,
        progress: Option<UploadProgress>,
    ) -> Result<HttpResponse, TransportError> {
        let key = (Method::POST, request.path.clone());
        self.uploads.lock().unwrap().push(request);
        let result = self.next_reply(key).await;
        if let (Ok(_), Some(progress)) = (&result, progress) {
            progress(100.0);
        }
        result
    }
}

impl MockTransport {
    async fn next_reply(&self, key: (Method, String)) -> Result<HttpResponse, TransportError> {
        let reply = self.routes.lock().unwrap().get_mut(&key).and_then(VecDeque::pop_front);
        let Some(reply) = reply else {
            return Ok(response(404, &json!({"success": false, "error": "Route not found"})));
        };
        if let Some(gate) = reply.gate {
            gate.notified().await;
        }
        reply.result
    }
}

fn response(status: u16, body: &Value) -> HttpResponse {
    HttpResponse { status, body: body.to_string() }
}

/// `{success: true, data}` envelope.
pub fn ok(data: Value) -> Value {
    json!({"success": true, "data": data})
}

/// `{success: false, error}` envelope.
pub fn failure(message: &str) -> Value {
    json!({"success": false, "error": message})
}

pub fn profile_json(id: &str, username: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "email": format!("{username}@example.com"),
        "preferences": {"theme": "dark", "language": "en", "notifications": true}
    })
}

pub fn auth_json(token: &str, id: &str, username: &str) -> Value {
    ok(json!({"token": token, "user": {"id": id, "username": username}}))
}
