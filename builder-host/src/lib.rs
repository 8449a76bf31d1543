//! Virtualization host connector library.
//!
//! This library provides the session-scoped interface the builder service
//! uses to drive a local virtualization host. It defines the core
//! [`Hypervisor`] and [`HostConnection`] traits, a VMware backend driven
//! through the `vmrun` CLI, and descriptor (VMX) handling.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod error;
pub mod vmrun;
pub mod vmx;

// When the `test-helpers` feature is enabled, include the mock hypervisor.
#[cfg(feature = "test-helpers")]
pub mod mock;

pub use error::{HostError, Result};
pub use vmx::Descriptor;

/// Host virtualization backend flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Workstation,
    Fusion,
    Player,
}

impl ProviderKind {
    /// The `-T` flavor argument `vmrun` expects.
    pub fn vmrun_flavor(&self) -> &'static str {
        match self {
            ProviderKind::Workstation => "ws",
            ProviderKind::Fusion => "fusion",
            ProviderKind::Player => "player",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "workstation" | "ws" => Ok(ProviderKind::Workstation),
            "fusion" => Ok(ProviderKind::Fusion),
            "player" => Ok(ProviderKind::Player),
            other => Err(format!("unknown provider kind: {other}")),
        }
    }
}

/// Connection type of a virtual network adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    #[default]
    Bridged,
    Nat,
    Hostonly,
}

impl NetworkType {
    /// Value the descriptor stores for `ethernetN.connectionType`.
    pub fn descriptor_value(&self) -> &'static str {
        match self {
            NetworkType::Bridged => "bridged",
            NetworkType::Nat => "nat",
            NetworkType::Hostonly => "hostonly",
        }
    }
}

/// A virtual network adapter attached to a guest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkAdapter {
    pub connection_type: NetworkType,
}

/// Desired guest settings submitted to the host on create.
#[derive(Debug, Clone)]
pub struct GuestSpec {
    pub name: String,
    /// Descriptor path of the base image to clone from.
    pub image_path: String,
    pub cpus: u32,
    /// Memory size in host format, e.g. `"1024"`, `"1024MB"`, `"2GB"`.
    pub memory: String,
    pub adapters: Vec<NetworkAdapter>,
    pub upgrade_virtual_hardware: bool,
    /// How long the host waits for guest tooling readiness after power-on.
    pub tools_init_timeout: Duration,
    pub launch_gui: bool,
}

/// What the host reports once a guest is durably created.
#[derive(Debug, Clone)]
pub struct GuestInfo {
    /// Host-assigned identifier of the guest.
    pub name: String,
    /// Location of the host-native descriptor file.
    pub descriptor_path: String,
    /// Guest IP, if the host already knows it.
    pub ip_address: Option<String>,
}

/// The seam to a virtualization host.
///
/// A hypervisor hands out one [`HostConnection`] per logical operation;
/// connections are never pooled or shared.
pub trait Hypervisor: Send + Sync {
    /// Get the name of the backend (e.g. "vmrun").
    fn name(&self) -> &'static str;

    /// Open an authenticated session to the host.
    fn connect(&self) -> Result<Box<dyn HostConnection>>;
}

/// A scoped session to the host.
///
/// The session is released when the handle is dropped, on every exit
/// path. All operations block on host I/O.
pub trait HostConnection: Send {
    /// Raw identifiers (descriptor paths) of currently running guests.
    fn running_vm_ids(&self) -> Result<Vec<String>>;

    /// Open the host-native descriptor at `path`.
    ///
    /// An unreadable or corrupt descriptor is a [`HostError::Descriptor`],
    /// which is distinct from the guest not existing at all.
    fn open_descriptor(&self, path: &str) -> Result<Descriptor>;

    /// Clone, configure, and power on a new guest.
    fn create_vm(&self, spec: &GuestSpec) -> Result<GuestInfo>;

    /// Re-query the guest IP for the descriptor at `path`.
    fn guest_ip(&self, path: &str) -> Result<Option<String>>;

    /// Power off and remove the guest owning the descriptor at `path`.
    fn destroy_vm(&self, path: &str) -> Result<()>;
}

/// Build the hypervisor backend for `kind`.
///
/// `verify_ssl` applies to remote host sessions; local `vmrun` sessions
/// carry it for parity but do not dial TLS.
pub fn get_hypervisor(
    kind: ProviderKind,
    vm_dir: impl Into<PathBuf>,
    verify_ssl: bool,
) -> Box<dyn Hypervisor> {
    Box::new(vmrun::VmrunHypervisor::new(kind, vm_dir.into(), verify_ssl))
}
