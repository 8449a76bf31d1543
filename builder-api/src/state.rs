use std::sync::Arc;
use std::time::Duration;

use builder_host::Hypervisor;
use tokio::sync::Semaphore;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hypervisor: Arc<dyn Hypervisor>,
    pub http: reqwest::Client,

    /// Bounds concurrent host-side creations; acceptance stays
    /// immediate, excess workers queue on a permit.
    pub create_permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(hypervisor: Arc<dyn Hypervisor>, config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.callback_timeout_secs))
            .build()?;
        let create_permits = Arc::new(Semaphore::new(config.max_inflight_creates));

        Ok(Self {
            config: Arc::new(config),
            hypervisor,
            http,
            create_permits,
        })
    }
}
