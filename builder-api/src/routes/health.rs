use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "builder-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness_check(State(state): State<AppState>) -> Json<Value> {
    // Check that the virtualization host answers a session open.
    let hypervisor = state.hypervisor.clone();
    let host_ok = tokio::task::spawn_blocking(move || hypervisor.connect().is_ok())
        .await
        .unwrap_or(false);

    Json(json!({
        "status": if host_ok { "ready" } else { "not_ready" },
        "service": "builder-api",
        "version": env!("CARGO_PKG_VERSION"),
        "host": if host_ok { "connected" } else { "disconnected" }
    }))
}
