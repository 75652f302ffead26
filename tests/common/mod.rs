//! In-process fake backend for integration tests.
//!
//! Speaks the same envelope format as the real API: `{success, data}` on
//! success, `{success: false, error}` on failure.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

pub const PASSWORD: &str = "pw";

#[derive(Default)]
pub struct Backend {
    profile_fetches: AtomicUsize,
    logouts: AtomicUsize,
    revoked: AtomicBool,
}

impl Backend {
    pub fn profile_fetches(&self) -> usize {
        self.profile_fetches.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    /// Reject every token from now on.
    pub fn revoke_tokens(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }
}

/// Bind the fake backend on an ephemeral port. Returns its base URL.
pub async fn spawn_backend() -> (String, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/profile", get(profile))
        .route("/echo", any(echo))
        .route("/upload", post(upload))
        .route("/status/{code}", get(status).post(status))
        .route("/slow", get(slow))
        .with_state(Arc::clone(&backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), backend)
}

fn fail(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({"success": false, "error": message})))
}

async fn health() -> Json<Value> {
    Json(json!({"success": true, "data": {"status": "ok", "message": "healthy"}}))
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let username = body["username"].as_str().unwrap_or_default();
    if body["password"] != PASSWORD {
        return fail(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }
    let data = json!({"token": format!("tok-{username}"), "user": profile_for(username)});
    (StatusCode::OK, Json(json!({"success": true, "data": data})))
}

async fn logout(State(backend): State<Arc<Backend>>) -> Json<Value> {
    backend.logouts.fetch_add(1, Ordering::SeqCst);
    Json(json!({"success": true}))
}

async fn profile(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    backend.profile_fetches.fetch_add(1, Ordering::SeqCst);
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer tok-"));
    match bearer {
        Some(username) if !backend.revoked.load(Ordering::SeqCst) => {
            (StatusCode::OK, Json(json!({"success": true, "data": profile_for(username)})))
        }
        _ => fail(StatusCode::UNAUTHORIZED, "Token expired"),
    }
}

fn profile_for(username: &str) -> Value {
    json!({
        "id": format!("u-{username}"),
        "username": username,
        "email": format!("{username}@example.com"),
        "preferences": {"theme": "dark", "language": "en", "notifications": true}
    })
}

async fn echo(method: Method, Query(query): Query<BTreeMap<String, String>>, headers: HeaderMap, body: String) -> Json<Value> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
    let body: Value = if body.is_empty() { Value::Null } else { serde_json::from_str(&body).unwrap() };
    Json(json!({
        "method": method.as_str(),
        "query": query,
        "authorization": header("authorization"),
        "content_type": header("content-type"),
        "body": body,
    }))
}

/// Echoes the first multipart field. Requires a bearer token.
async fn upload(headers: HeaderMap, mut multipart: Multipart) -> (StatusCode, Json<Value>) {
    let Some(authorization) = headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_owned) else {
        return fail(StatusCode::UNAUTHORIZED, "Missing token");
    };
    let Some(field) = multipart.next_field().await.unwrap() else {
        return fail(StatusCode::BAD_REQUEST, "No file");
    };
    let name = field.name().map(str::to_owned);
    let file_name = field.file_name().map(str::to_owned);
    let content_type = field.content_type().map(str::to_owned);
    let bytes = field.bytes().await.unwrap();
    let data = json!({
        "field": name,
        "file_name": file_name,
        "content_type": content_type,
        "size": bytes.len(),
        "authorization": authorization,
    });
    (StatusCode::OK, Json(json!({"success": true, "data": data})))
}

async fn status(Path(code): Path<u16>) -> (StatusCode, String) {
    (StatusCode::from_u16(code).unwrap(), format!("status {code}"))
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "late"
}
