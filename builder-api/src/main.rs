use std::sync::Arc;

use anyhow::Result;
use builder_api::{create_app, Config};
use builder_host::Hypervisor;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("builder_api=debug,builder_host=debug,tower_http=debug")
        .init();

    info!("Starting builder-api service...");

    let config = Config::from_env();
    info!(
        "Configuration loaded: bind_addr={}, provider={:?}, vm_dir={}",
        config.bind_addr,
        config.provider,
        config.vm_dir.display()
    );

    let hypervisor: Arc<dyn Hypervisor> = Arc::from(builder_host::get_hypervisor(
        config.provider,
        config.vm_dir.clone(),
        config.verify_ssl,
    ));

    let app = create_app(hypervisor, config.clone())?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
