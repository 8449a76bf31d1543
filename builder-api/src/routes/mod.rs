pub mod health;
pub mod vms;

use std::sync::Arc;

use axum::Router;
use builder_host::Hypervisor;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::Config, state::AppState};

pub fn create_app(hypervisor: Arc<dyn Hypervisor>, config: Config) -> anyhow::Result<Router> {
    let state = AppState::new(hypervisor, config)?;

    let app = Router::new()
        .merge(health::routes())
        .merge(vms::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}
