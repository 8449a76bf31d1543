//! The VM entity and its host-backed repository operations.
//!
//! A `Vm` starts as the orchestrator's working copy built from a client
//! request. It becomes addressable by `find` and `destroy` only once the
//! host has durably created it and assigned a descriptor path.

use std::time::Duration;

use builder_host::{GuestSpec, HostError, Hypervisor, NetworkAdapter, NetworkType, ProviderKind};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Seconds the host waits for guest tooling when the client does not say.
const DEFAULT_TOOLS_TIMEOUT_SECS: u64 = 120;

/// Opaque reference to a base OS image on the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Image {
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Vm {
    pub name: String,
    pub image: Image,
    pub cpus: u32,
    pub memory: String,
    pub launch_gui: bool,

    /// Empty until the host reports an address.
    pub ip_address: String,

    #[serde(skip)]
    pub provider: ProviderKind,
    #[serde(skip)]
    pub verify_ssl: bool,
    #[serde(skip)]
    pub network_adapters: Vec<NetworkAdapter>,
    #[serde(skip)]
    pub upgrade_virtual_hardware: bool,
    #[serde(skip)]
    pub tools_init_timeout: Duration,
    #[serde(skip)]
    pub bootstrap_script: String,

    /// Host descriptor location; empty until the guest is host-durable.
    #[serde(skip)]
    pub config_file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVmRequest {
    #[serde(default)]
    pub cpus: u32,
    #[serde(default)]
    pub memory: String,
    #[serde(default)]
    pub network_type: NetworkType,
    pub image: Image,
    #[serde(default)]
    pub bootstrap_script: String,
    /// Seconds the host may wait for guest tooling readiness.
    #[serde(default)]
    pub tools_init_timeout: u64,
    #[serde(default)]
    pub launch_gui: bool,
    #[serde(default)]
    pub callback_url: String,
}

impl Vm {
    /// Build the transient, host-unconfirmed guest for a creation
    /// request.
    pub fn pending(config: &Config, name: String, params: &CreateVmRequest) -> Self {
        let cpus = params.cpus.max(1);
        let memory = if params.memory.is_empty() {
            "1024".to_string()
        } else {
            params.memory.clone()
        };
        let tools_timeout_secs = if params.tools_init_timeout == 0 {
            DEFAULT_TOOLS_TIMEOUT_SECS
        } else {
            params.tools_init_timeout
        };

        Vm {
            name,
            image: params.image.clone(),
            cpus,
            memory,
            launch_gui: params.launch_gui,
            ip_address: String::new(),
            provider: config.provider,
            verify_ssl: config.verify_ssl,
            network_adapters: vec![NetworkAdapter {
                connection_type: params.network_type,
            }],
            upgrade_virtual_hardware: false,
            tools_init_timeout: Duration::from_secs(tools_timeout_secs),
            bootstrap_script: params.bootstrap_script.clone(),
            config_file_path: String::new(),
        }
    }

    fn guest_spec(&self) -> GuestSpec {
        GuestSpec {
            name: self.name.clone(),
            image_path: self.image.path.clone(),
            cpus: self.cpus,
            memory: self.memory.clone(),
            adapters: self.network_adapters.clone(),
            upgrade_virtual_hardware: self.upgrade_virtual_hardware,
            tools_init_timeout: self.tools_init_timeout,
            launch_gui: self.launch_gui,
        }
    }

    /// Resolve a host-durable guest by identifier.
    ///
    /// `Ok(None)` means the host knows no such guest. A descriptor that
    /// exists but cannot be opened is an error, never `None`.
    pub fn find(
        hypervisor: &dyn Hypervisor,
        config: &Config,
        id: &str,
    ) -> Result<Option<Vm>, HostError> {
        let conn = hypervisor.connect()?;

        for path in conn.running_vm_ids()? {
            let descriptor = conn.open_descriptor(&path)?;
            if descriptor.display_name() == Some(id) {
                return Ok(Some(Vm {
                    name: id.to_string(),
                    image: Image::default(),
                    cpus: descriptor.cpus().unwrap_or_default(),
                    memory: descriptor
                        .memory_mb()
                        .map(|mb| format!("{mb}MB"))
                        .unwrap_or_default(),
                    launch_gui: false,
                    ip_address: String::new(),
                    provider: config.provider,
                    verify_ssl: config.verify_ssl,
                    network_adapters: Vec::new(),
                    upgrade_virtual_hardware: false,
                    tools_init_timeout: Duration::from_secs(DEFAULT_TOOLS_TIMEOUT_SECS),
                    bootstrap_script: String::new(),
                    config_file_path: path,
                }));
            }
        }

        Ok(None)
    }

    /// Submit the desired configuration to the host. On success the
    /// guest is durable: `config_file_path` is set and `ip_address` may
    /// already be known. Returns the host-assigned identifier.
    pub fn create(&mut self, hypervisor: &dyn Hypervisor) -> Result<String, HostError> {
        let conn = hypervisor.connect()?;
        let info = conn.create_vm(&self.guest_spec())?;

        self.config_file_path = info.descriptor_path;
        if let Some(ip) = info.ip_address {
            self.ip_address = ip;
        }

        Ok(info.name)
    }

    /// Re-query the host for runtime state, notably the guest IP.
    /// Called only while `ip_address` is still empty; a lookup is
    /// cheaper than this round trip.
    pub fn refresh(&mut self, hypervisor: &dyn Hypervisor) -> Result<(), HostError> {
        let conn = hypervisor.connect()?;
        if let Some(ip) = conn.guest_ip(&self.config_file_path)? {
            self.ip_address = ip;
        }
        Ok(())
    }

    /// Remove the guest's host-side state. Operates on the descriptor
    /// path, which only a host-durable guest has.
    pub fn destroy(&self, hypervisor: &dyn Hypervisor) -> Result<(), HostError> {
        let conn = hypervisor.connect()?;
        conn.destroy_vm(&self.config_file_path)
    }
}
