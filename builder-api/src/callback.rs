//! Delivery of asynchronous operation outcomes to caller-supplied URLs.

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::ApiError;

/// POST `payload` as JSON to `url`. Fire and forget, at most once.
///
/// An empty `url` means the caller opted out of notification. If the
/// payload cannot be serialized, the fixed marshal-failure error body is
/// delivered instead, so the endpoint always receives a well-formed
/// message. Transport failures are logged and dropped.
pub async fn deliver<T: Serialize>(client: &Client, url: &str, payload: &T) {
    if url.is_empty() {
        return;
    }

    let body = match serde_json::to_vec(payload) {
        Ok(body) => body,
        Err(e) => {
            let fallback = ApiError::CallbackMarshal(e.to_string());
            fallback.log("serializing callback payload");
            match serde_json::to_vec(&fallback.body()) {
                Ok(body) => body,
                Err(_) => return,
            }
        }
    };

    match client
        .post(url)
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
    {
        Ok(response) => debug!(url, status = %response.status(), "callback delivered"),
        Err(e) => error!(url, error = %e, "callback delivery failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde::ser::Error as _;
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn record(
        State(received): State<Received>,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        received.lock().unwrap().push(body);
        StatusCode::OK
    }

    async fn receiver() -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route("/cb", post(record))
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/cb"), received)
    }

    /// Serializes to an error unconditionally.
    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cyclic payload"))
        }
    }

    #[tokio::test]
    async fn empty_url_is_a_no_op() {
        let client = Client::new();
        deliver(&client, "", &serde_json::json!({"name": "vm"})).await;
    }

    #[tokio::test]
    async fn delivers_payload_once() {
        let (url, received) = receiver().await;
        let client = Client::new();

        deliver(&client, &url, &serde_json::json!({"name": "agent-1"})).await;

        let got = received.lock().unwrap().clone();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0]["name"], "agent-1");
    }

    #[tokio::test]
    async fn marshal_failure_delivers_fallback_error() {
        let (url, received) = receiver().await;
        let client = Client::new();

        deliver(&client, &url, &Unserializable).await;

        let got = received.lock().unwrap().clone();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0]["code"], "err-marshalling-response");
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed() {
        let client = Client::new();
        // Nothing listens here; delivery must not panic or retry.
        deliver(
            &client,
            "http://127.0.0.1:1/cb",
            &serde_json::json!({"name": "vm"}),
        )
        .await;
    }
}
