mod common;

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use webstate::config::HttpTimeouts;
use webstate::net::transport::{
    HttpRequest, Method, ReqwestTransport, Transport, TransportError, UploadFile, UploadProgress, UploadRequest,
};

const TIMEOUTS: HttpTimeouts = HttpTimeouts { request_secs: 5, connect_secs: 2 };

fn echoed(body: &str) -> Value {
    serde_json::from_str::<Value>(body).unwrap()["data"].clone()
}

#[tokio::test]
async fn sends_query_headers_and_json_body() {
    let (base_url, _) = common::spawn_backend().await;
    let transport = ReqwestTransport::new(&base_url, TIMEOUTS).unwrap();

    let mut request = HttpRequest::new(Method::PUT, "/echo");
    request.query.push(("page".to_owned(), "2".to_owned()));
    request.headers.push(("Authorization".to_owned(), "Bearer tok".to_owned()));
    request.body = Some(json!({"name": "board"}));
    let response = transport.send(request).await.unwrap();

    assert_eq!(response.status, 200);
    let echo = echoed(&response.body);
    assert_eq!(echo["method"], "PUT");
    assert_eq!(echo["query"]["page"], "2");
    assert_eq!(echo["authorization"], "Bearer tok");
    assert_eq!(echo["content_type"], "application/json");
    assert_eq!(echo["body"]["name"], "board");
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_ignored() {
    let (base_url, _) = common::spawn_backend().await;
    let transport = ReqwestTransport::new(&format!("{base_url}/"), TIMEOUTS).unwrap();
    assert_eq!(transport.base_url(), base_url);

    let response = transport.send(HttpRequest::new(Method::GET, "/health")).await.unwrap();
    assert!(response.is_success());
}

#[tokio::test]
async fn error_statuses_are_responses_not_failures() {
    let (base_url, _) = common::spawn_backend().await;
    let transport = ReqwestTransport::new(&base_url, TIMEOUTS).unwrap();

    let response = transport.send(HttpRequest::new(Method::GET, "/status/503")).await.unwrap();

    assert_eq!(response.status, 503);
    assert!(!response.is_success());
    assert_eq!(response.body, "status 503");
}

#[tokio::test]
async fn refused_connection_is_a_request_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let transport = ReqwestTransport::new(&format!("http://{addr}"), TIMEOUTS).unwrap();

    let err = transport.send(HttpRequest::new(Method::GET, "/health")).await.unwrap_err();

    assert!(matches!(err, TransportError::Request(_)), "got {err:?}");
}

#[tokio::test]
async fn slow_response_times_out() {
    let (base_url, _) = common::spawn_backend().await;
    let timeouts = HttpTimeouts { request_secs: 1, connect_secs: 1 };
    let transport = ReqwestTransport::new(&base_url, timeouts).unwrap();

    let err = transport.send(HttpRequest::new(Method::GET, "/slow")).await.unwrap_err();

    assert!(matches!(err, TransportError::Timeout), "got {err:?}");
}

#[tokio::test]
async fn upload_streams_multipart_and_reports_progress() {
    let (base_url, _) = common::spawn_backend().await;
    let transport = ReqwestTransport::new(&base_url, TIMEOUTS).unwrap();
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let progress: UploadProgress = Arc::new(move |p| sink.lock().unwrap().push(p));

    let file = UploadFile::new("avatar.png", vec![7u8; 200 * 1024]).with_content_type("image/png");
    let mut request = UploadRequest::new("/upload", file);
    request.headers.push(("Authorization".to_owned(), "Bearer tok".to_owned()));
    let response = transport.upload(request, Some(progress)).await.unwrap();

    assert_eq!(response.status, 200);
    let echo = echoed(&response.body);
    assert_eq!(echo["field"], "file");
    assert_eq!(echo["file_name"], "avatar.png");
    assert_eq!(echo["content_type"], "image/png");
    assert_eq!(echo["size"], 200 * 1024);
    assert_eq!(echo["authorization"], "Bearer tok");

    let reported = reported.lock().unwrap();
    assert_eq!(reported.len(), 4);
    assert!(reported.windows(2).all(|w| w[0] < w[1]));
    assert!((reported[reported.len() - 1] - 100.0).abs() < f64::EPSILON);
}
