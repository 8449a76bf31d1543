//! In-memory hypervisor for consumers' tests.
//!
//! The mock keeps its guests behind a shared handle so a test can seed
//! state, hand a clone to the code under test, and assert on what the
//! host was asked to do afterwards.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{HostError, Result};
use crate::vmx::{parse_memory_mb, Descriptor};
use crate::{GuestInfo, GuestSpec, HostConnection, Hypervisor};

#[derive(Clone, Default)]
pub struct MockHypervisor {
    state: Arc<Mutex<MockHost>>,
}

#[derive(Default)]
struct MockHost {
    vms: Vec<MockVm>,
    fail_connect: Option<String>,
    fail_create: Option<String>,
    withhold_ip_on_create: bool,
    create_delay: Option<Duration>,
    inflight_creates: usize,
    max_inflight_creates: usize,
    destroyed: Vec<String>,
}

struct MockVm {
    name: String,
    descriptor_path: String,
    ip_address: Option<String>,
    cpus: u32,
    memory_mb: u32,
    corrupt: bool,
}

fn mock_descriptor_path(name: &str) -> String {
    format!("/mock/vms/{name}/{name}.vmx")
}

impl MockHypervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a running guest the host already knows about.
    pub fn add_running_vm(&self, name: &str, ip_address: Option<&str>) -> String {
        let path = mock_descriptor_path(name);
        self.state.lock().unwrap().vms.push(MockVm {
            name: name.to_string(),
            descriptor_path: path.clone(),
            ip_address: ip_address.map(str::to_string),
            cpus: 2,
            memory_mb: 1024,
            corrupt: false,
        });
        path
    }

    /// Seed a running guest whose descriptor cannot be opened.
    pub fn add_corrupt_vm(&self, name: &str) -> String {
        let path = mock_descriptor_path(name);
        self.state.lock().unwrap().vms.push(MockVm {
            name: name.to_string(),
            descriptor_path: path.clone(),
            ip_address: None,
            cpus: 0,
            memory_mb: 0,
            corrupt: true,
        });
        path
    }

    /// Make every subsequent session-open fail.
    pub fn fail_connect(&self, reason: &str) {
        self.state.lock().unwrap().fail_connect = Some(reason.to_string());
    }

    /// Make every subsequent create fail.
    pub fn fail_create(&self, reason: &str) {
        self.state.lock().unwrap().fail_create = Some(reason.to_string());
    }

    /// Created guests report no IP until `guest_ip` is asked.
    pub fn withhold_ip_on_create(&self) {
        self.state.lock().unwrap().withhold_ip_on_create = true;
    }

    /// Make create block for `delay`, to observe admission limits.
    pub fn set_create_delay(&self, delay: Duration) {
        self.state.lock().unwrap().create_delay = Some(delay);
    }

    /// Descriptor paths destroy was called with.
    pub fn destroyed(&self) -> Vec<String> {
        self.state.lock().unwrap().destroyed.clone()
    }

    pub fn running_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .vms
            .iter()
            .map(|vm| vm.name.clone())
            .collect()
    }

    /// Highest number of creates the host ever saw in flight at once.
    pub fn max_inflight_creates(&self) -> usize {
        self.state.lock().unwrap().max_inflight_creates
    }
}

impl Hypervisor for MockHypervisor {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn connect(&self) -> Result<Box<dyn HostConnection>> {
        if let Some(reason) = &self.state.lock().unwrap().fail_connect {
            return Err(HostError::Connect(reason.clone()));
        }
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
        }))
    }
}

struct MockConnection {
    state: Arc<Mutex<MockHost>>,
}

impl HostConnection for MockConnection {
    fn running_vm_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .vms
            .iter()
            .map(|vm| vm.descriptor_path.clone())
            .collect())
    }

    fn open_descriptor(&self, path: &str) -> Result<Descriptor> {
        let state = self.state.lock().unwrap();
        let vm = state
            .vms
            .iter()
            .find(|vm| vm.descriptor_path == path)
            .ok_or_else(|| HostError::Descriptor {
                path: path.to_string(),
                reason: "no such descriptor".to_string(),
            })?;

        if vm.corrupt {
            return Err(HostError::Descriptor {
                path: path.to_string(),
                reason: "stalled lock".to_string(),
            });
        }

        Ok(Descriptor::from_entries(
            path,
            vec![
                ("displayName".to_string(), vm.name.clone()),
                ("numvcpus".to_string(), vm.cpus.to_string()),
                ("memsize".to_string(), vm.memory_mb.to_string()),
            ],
        ))
    }

    fn create_vm(&self, spec: &GuestSpec) -> Result<GuestInfo> {
        let (delay, failure, withhold_ip) = {
            let mut state = self.state.lock().unwrap();
            state.inflight_creates += 1;
            state.max_inflight_creates = state.max_inflight_creates.max(state.inflight_creates);
            (
                state.create_delay,
                state.fail_create.clone(),
                state.withhold_ip_on_create,
            )
        };

        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let result = (|| {
            if let Some(reason) = failure {
                return Err(HostError::Create(reason));
            }
            let memory_mb = parse_memory_mb(&spec.memory)?;

            let path = mock_descriptor_path(&spec.name);
            let ip_address = Some(format!("192.168.105.{}", spec.name.len() % 250 + 2));

            let mut state = self.state.lock().unwrap();
            state.vms.push(MockVm {
                name: spec.name.clone(),
                descriptor_path: path.clone(),
                ip_address: ip_address.clone(),
                cpus: spec.cpus,
                memory_mb,
                corrupt: false,
            });

            Ok(GuestInfo {
                name: spec.name.clone(),
                descriptor_path: path,
                ip_address: if withhold_ip { None } else { ip_address },
            })
        })();

        self.state.lock().unwrap().inflight_creates -= 1;
        result
    }

    fn guest_ip(&self, path: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .vms
            .iter()
            .find(|vm| vm.descriptor_path == path)
            .and_then(|vm| vm.ip_address.clone()))
    }

    fn destroy_vm(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.vms.retain(|vm| vm.descriptor_path != path);
        state.destroyed.push(path.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spec(name: &str) -> GuestSpec {
        GuestSpec {
            name: name.to_string(),
            image_path: "/images/base/base.vmx".to_string(),
            cpus: 2,
            memory: "1024MB".to_string(),
            adapters: vec![],
            upgrade_virtual_hardware: false,
            tools_init_timeout: Duration::from_secs(30),
            launch_gui: false,
        }
    }

    #[test]
    fn create_then_find_by_descriptor() {
        let host = MockHypervisor::new();
        let conn = host.connect().unwrap();

        let info = conn.create_vm(&spec("agent-1")).unwrap();
        assert_eq!(info.name, "agent-1");

        let ids = conn.running_vm_ids().unwrap();
        assert_eq!(ids, vec![info.descriptor_path.clone()]);

        let desc = conn.open_descriptor(&info.descriptor_path).unwrap();
        assert_eq!(desc.display_name(), Some("agent-1"));
        assert_eq!(desc.memory_mb(), Some(1024));
    }

    #[test]
    fn corrupt_descriptor_is_open_failure() {
        let host = MockHypervisor::new();
        let path = host.add_corrupt_vm("broken");
        let conn = host.connect().unwrap();

        assert!(matches!(
            conn.open_descriptor(&path),
            Err(HostError::Descriptor { .. })
        ));
    }

    #[test]
    fn destroy_removes_guest() {
        let host = MockHypervisor::new();
        let path = host.add_running_vm("victim", None);
        let conn = host.connect().unwrap();

        conn.destroy_vm(&path).unwrap();
        assert!(conn.running_vm_ids().unwrap().is_empty());
        assert_eq!(host.destroyed(), vec![path]);
    }

    #[test]
    fn failed_connect_propagates_reason() {
        let host = MockHypervisor::new();
        host.fail_connect("host offline");

        match host.connect() {
            Err(HostError::Connect(reason)) => assert_eq!(reason, "host offline"),
            Err(other) => panic!("expected connect failure, got {other:?}"),
            Ok(_) => panic!("expected connect failure, got a session"),
        }
    }
}
