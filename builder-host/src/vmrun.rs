//! VMware backend driven through the `vmrun` CLI.

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{HostError, Result};
use crate::vmx::{parse_memory_mb, Descriptor};
use crate::{GuestInfo, GuestSpec, HostConnection, Hypervisor, ProviderKind};

const TOOLS_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct VmrunHypervisor {
    flavor: ProviderKind,
    vm_dir: PathBuf,
    verify_ssl: bool,
}

impl VmrunHypervisor {
    pub fn new(flavor: ProviderKind, vm_dir: PathBuf, verify_ssl: bool) -> Self {
        Self {
            flavor,
            vm_dir,
            verify_ssl,
        }
    }
}

impl Hypervisor for VmrunHypervisor {
    fn name(&self) -> &'static str {
        "vmrun"
    }

    fn connect(&self) -> Result<Box<dyn HostConnection>> {
        let conn = VmrunConnection {
            flavor: self.flavor,
            vm_dir: self.vm_dir.clone(),
        };

        // Probing the host validates both the vmrun binary and the
        // hypervisor service in one round trip.
        conn.vmrun(&["list"])
            .map_err(|e| HostError::Connect(e.to_string()))?;

        debug!(
            flavor = conn.flavor.vmrun_flavor(),
            verify_ssl = self.verify_ssl,
            "host session opened"
        );
        Ok(Box::new(conn))
    }
}

pub struct VmrunConnection {
    flavor: ProviderKind,
    vm_dir: PathBuf,
}

impl VmrunConnection {
    /// Run `vmrun -T <flavor> <args...>` and return its stdout.
    fn vmrun(&self, args: &[&str]) -> Result<String> {
        let command = format!("vmrun {}", args.first().copied().unwrap_or_default());

        let output = Command::new("vmrun")
            .arg("-T")
            .arg(self.flavor.vmrun_flavor())
            .args(args)
            .output()
            .map_err(|e| HostError::Command {
                command: command.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            // vmrun reports failures on stdout more often than stderr.
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(HostError::Command { command, detail });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn wait_for_tools(&self, descriptor_path: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.vmrun(&["checkToolsState", descriptor_path])?;
            if state.trim() == "running" {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(HostError::Create(format!(
                    "guest tools not ready within {}s",
                    timeout.as_secs()
                )));
            }
            std::thread::sleep(TOOLS_POLL_INTERVAL);
        }
    }
}

impl HostConnection for VmrunConnection {
    fn running_vm_ids(&self) -> Result<Vec<String>> {
        let output = self.vmrun(&["list"])?;
        Ok(parse_list_output(&output))
    }

    fn open_descriptor(&self, path: &str) -> Result<Descriptor> {
        Descriptor::load(path)
    }

    fn create_vm(&self, spec: &GuestSpec) -> Result<GuestInfo> {
        let memory_mb = parse_memory_mb(&spec.memory)?;

        let guest_dir = self.vm_dir.join(&spec.name);
        std::fs::create_dir_all(&guest_dir)?;
        let descriptor_path = guest_dir.join(format!("{}.vmx", spec.name));
        let descriptor_path = descriptor_path.to_string_lossy().into_owned();

        let clone_name = format!("-cloneName={}", spec.name);
        self.vmrun(&[
            "clone",
            &spec.image_path,
            &descriptor_path,
            "full",
            &clone_name,
        ])?;

        let mut descriptor = Descriptor::load(&descriptor_path)?;
        descriptor.set("displayName", &spec.name);
        descriptor.set("numvcpus", &spec.cpus.to_string());
        descriptor.set("memsize", &memory_mb.to_string());
        for (i, adapter) in spec.adapters.iter().enumerate() {
            descriptor.set(&format!("ethernet{i}.present"), "TRUE");
            descriptor.set(
                &format!("ethernet{i}.connectionType"),
                adapter.connection_type.descriptor_value(),
            );
        }
        descriptor.save()?;

        if spec.upgrade_virtual_hardware {
            self.vmrun(&["upgradevm", &descriptor_path])?;
        }

        let gui = if spec.launch_gui { "gui" } else { "nogui" };
        self.vmrun(&["start", &descriptor_path, gui])?;

        self.wait_for_tools(&descriptor_path, spec.tools_init_timeout)?;

        // IP discovery is best effort here; the caller refreshes later if
        // the host has not learned it yet.
        let ip_address = match self.guest_ip(&descriptor_path) {
            Ok(ip) => ip,
            Err(e) => {
                debug!(error = %e, guest = %spec.name, "guest IP not available after create");
                None
            }
        };

        Ok(GuestInfo {
            name: spec.name.clone(),
            descriptor_path,
            ip_address,
        })
    }

    fn guest_ip(&self, path: &str) -> Result<Option<String>> {
        let output = self.vmrun(&["getGuestIPAddress", path])?;
        let ip = output.trim();
        if ip.is_empty() || ip == "unknown" {
            return Ok(None);
        }
        Ok(Some(ip.to_string()))
    }

    fn destroy_vm(&self, path: &str) -> Result<()> {
        // A guest that is already powered off makes `stop` fail; that is
        // not a reason to keep its descriptor around.
        if let Err(e) = self.vmrun(&["stop", path, "hard"]) {
            warn!(error = %e, descriptor = path, "power off failed, deleting anyway");
        }
        self.vmrun(&["deleteVM", path])?;
        Ok(())
    }
}

impl Drop for VmrunConnection {
    fn drop(&mut self) {
        debug!(flavor = self.flavor.vmrun_flavor(), "host session released");
    }
}

/// `vmrun list` prints a `Total running VMs: N` header followed by one
/// descriptor path per line.
fn parse_list_output(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("Total running VMs"))
        .map(str::to_string)
        .collect()
}
