//! Asynchronous guest creation workflow.
//!
//! The request handler returns 202 with the pending guest and hands the
//! rest of the lifecycle to `provision_vm`, which runs detached: create,
//! refresh the IP if the host did not report one, then notify the
//! callback URL. One attempt, one notification; nothing is retried.

use builder_host::HostError;
use tracing::{info, warn};

use crate::callback;
use crate::error::ApiError;
use crate::state::AppState;
use crate::vm::Vm;

pub async fn provision_vm(state: AppState, vm: Vm, callback_url: String) {
    // Admission: host-side clone work is bounded even though every
    // request was already accepted.
    let _permit = match state.create_permits.clone().acquire_owned().await {
        Ok(permit) => permit,
        // Closed semaphore means the process is shutting down.
        Err(_) => return,
    };

    let hypervisor = state.hypervisor.clone();
    let mut vm = vm;
    let created = tokio::task::spawn_blocking(move || {
        let id = vm.create(hypervisor.as_ref())?;
        Ok::<_, HostError>((vm, id))
    })
    .await;

    let (mut vm, id) = match created {
        Ok(Ok((vm, id))) => (vm, id),
        Ok(Err(e)) => {
            let err = ApiError::VmCreate(e.to_string());
            err.log("creating virtual machine");
            callback::deliver(&state.http, &callback_url, &err.body()).await;
            return;
        }
        Err(e) => {
            let err = ApiError::VmCreate(format!("create task aborted: {e}"));
            err.log("creating virtual machine");
            callback::deliver(&state.http, &callback_url, &err.body()).await;
            return;
        }
    };

    info!(name = %vm.name, id = %id, "virtual machine created");

    // IP discovery is best effort: the guest is created either way, and
    // a failed refresh is not retried.
    if vm.ip_address.is_empty() {
        let hypervisor = state.hypervisor.clone();
        let before_refresh = vm.clone();
        vm = tokio::task::spawn_blocking(move || {
            if let Err(e) = vm.refresh(hypervisor.as_ref()) {
                warn!(name = %vm.name, error = %e, "guest IP refresh failed");
            }
            vm
        })
        .await
        .unwrap_or(before_refresh);
    }

    callback::deliver(&state.http, &callback_url, &vm).await;
}
