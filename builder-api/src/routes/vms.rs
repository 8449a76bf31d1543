use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::provisioner;
use crate::state::AppState;
use crate::vm::{CreateVmRequest, Vm};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vms", get(list_vms).post(create_vm))
        .route("/vms/{id}", get(get_vm).delete(destroy_vm))
}

/// Accepts a creation spec and returns 202 with the pending guest; the
/// host-side work continues detached and reports through the callback
/// URL, never through this connection.
async fn create_vm(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<(StatusCode, Json<Vm>)> {
    let body = body.map_err(|e| ApiError::RequestBody(e.to_string()))?;
    let params: CreateVmRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidJson(e.to_string()))?;

    let name = Uuid::new_v4().to_string();
    let vm = Vm::pending(&state.config, name, &params);

    tokio::spawn(provisioner::provision_vm(
        state.clone(),
        vm.clone(),
        params.callback_url,
    ));

    Ok((StatusCode::ACCEPTED, Json(vm)))
}

/// Lists the host's own view of running guests, not any local
/// bookkeeping.
async fn list_vms(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let hypervisor = state.hypervisor.clone();
    let ids = tokio::task::spawn_blocking(move || {
        let conn = hypervisor.connect()?;
        conn.running_vm_ids()
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(ids))
}

async fn get_vm(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Vm>> {
    match find_vm(&state, id).await? {
        Some(vm) => Ok(Json(vm)),
        None => Err(ApiError::VmNotFound),
    }
}

async fn destroy_vm(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let Some(vm) = find_vm(&state, id).await? else {
        return Err(ApiError::VmNotFound);
    };

    let hypervisor = state.hypervisor.clone();
    tokio::task::spawn_blocking(move || vm.destroy(hypervisor.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn find_vm(state: &AppState, id: String) -> ApiResult<Option<Vm>> {
    let hypervisor = state.hypervisor.clone();
    let config = state.config.clone();
    tokio::task::spawn_blocking(move || Vm::find(hypervisor.as_ref(), &config, &id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}
