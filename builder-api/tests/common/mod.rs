//! Common test utilities and helpers for builder-api tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    routing::post,
    Json, Router,
};
use builder_api::{create_app, Config};
use builder_host::{mock::MockHypervisor, ProviderKind};

pub fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        provider: ProviderKind::Workstation,
        vm_dir: "/tmp/builder-test-vms".into(),
        verify_ssl: false,
        max_inflight_creates: 2,
        callback_timeout_secs: 5,
    }
}

/// Assemble the app against a mock host.
pub fn create_test_app(host: &MockHypervisor) -> Router {
    create_app(Arc::new(host.clone()), test_config()).expect("Failed to create test app")
}

/// Helper to extract JSON body from axum response
pub async fn extract_json_body<T>(response: axum::response::Response) -> T
where
    T: serde::de::DeserializeOwned,
{
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");

    serde_json::from_slice(&body).expect("Failed to deserialize JSON")
}

pub fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// JSON bodies received by a callback endpoint.
pub type Received = Arc<Mutex<Vec<serde_json::Value>>>;

async fn record(
    State(received): State<Received>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    received.lock().unwrap().push(body);
    StatusCode::OK
}

/// Bind a throwaway endpoint that records every callback POSTed to it.
pub async fn callback_receiver() -> (String, Received) {
    let received: Received = Arc::default();
    let app = Router::new()
        .route("/cb", post(record))
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind callback receiver");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/cb"), received)
}

/// Poll `cond` for a few seconds; true if it ever held.
pub async fn wait_for(cond: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}
