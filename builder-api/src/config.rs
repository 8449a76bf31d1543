use std::path::PathBuf;

use builder_host::ProviderKind;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,

    /// Host virtualization backend flavor.
    pub provider: ProviderKind,

    /// Where cloned guest directories are placed.
    pub vm_dir: PathBuf,

    pub verify_ssl: bool,

    /// Admission limit for concurrent host-side creations.
    pub max_inflight_creates: usize,

    pub callback_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    std::env::var("BUILDER_API_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
}

fn default_provider() -> ProviderKind {
    std::env::var("BUILDER_API_PROVIDER")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(ProviderKind::Workstation)
}

fn default_vm_dir() -> PathBuf {
    if let Ok(path) = std::env::var("BUILDER_API_VM_DIR") {
        return PathBuf::from(path);
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".builder").join("vms")
}

fn default_verify_ssl() -> bool {
    std::env::var("BUILDER_API_VERIFY_SSL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(false)
}

fn default_max_inflight_creates() -> usize {
    std::env::var("BUILDER_API_MAX_INFLIGHT_CREATES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(4)
}

fn default_callback_timeout() -> u64 {
    std::env::var("BUILDER_API_CALLBACK_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            provider: default_provider(),
            vm_dir: default_vm_dir(),
            verify_ssl: default_verify_ssl(),
            max_inflight_creates: default_max_inflight_creates(),
            callback_timeout_secs: default_callback_timeout(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
