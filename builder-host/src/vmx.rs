//! VMX descriptor handling.
//!
//! A descriptor is the host-native file identifying a guest's persisted
//! configuration: ordered `key = "value"` lines. Destroy and lookup both
//! operate on descriptors, so parsing here stays deliberately lenient —
//! unknown lines are skipped, but a file yielding no settings at all is
//! reported as corrupt.

use std::fs;

use crate::error::{HostError, Result};

#[derive(Debug, Clone)]
pub struct Descriptor {
    path: String,
    entries: Vec<(String, String)>,
}

impl Descriptor {
    /// Read and parse the descriptor at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| HostError::Descriptor {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &str, text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let value = value.trim().trim_matches('"');
            entries.push((key.to_string(), value.to_string()));
        }

        if entries.is_empty() {
            return Err(HostError::Descriptor {
                path: path.to_string(),
                reason: "no settings found".to_string(),
            });
        }

        Ok(Self {
            path: path.to_string(),
            entries,
        })
    }

    /// Build a descriptor from known settings, without touching disk.
    pub fn from_entries(path: &str, entries: Vec<(String, String)>) -> Self {
        Self {
            path: path.to_string(),
            entries,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Look up a setting; VMX keys are case-insensitive.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Replace or append a setting.
    pub fn set(&mut self, key: &str, value: &str) {
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some((_, v)) => *v = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        self.get("displayName")
    }

    pub fn cpus(&self) -> Option<u32> {
        self.get("numvcpus").and_then(|v| v.parse().ok())
    }

    pub fn memory_mb(&self) -> Option<u32> {
        self.get("memsize").and_then(|v| v.parse().ok())
    }

    /// Write the descriptor back to its path.
    pub fn save(&self) -> Result<()> {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push_str(" = \"");
            out.push_str(value);
            out.push_str("\"\n");
        }
        fs::write(&self.path, out)?;
        Ok(())
    }
}

/// Parse a host-format memory size string into megabytes.
///
/// Accepts a bare number of megabytes or a `MB`/`GB` suffix.
pub fn parse_memory_mb(memory: &str) -> Result<u32> {
    let trimmed = memory.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (digits, multiplier) = if let Some(d) = upper.strip_suffix("MB") {
        (d.to_string(), 1)
    } else if let Some(d) = upper.strip_suffix("GB") {
        (d.to_string(), 1024)
    } else if let Some(d) = upper.strip_suffix('M') {
        (d.to_string(), 1)
    } else if let Some(d) = upper.strip_suffix('G') {
        (d.to_string(), 1024)
    } else {
        (upper, 1)
    };

    digits
        .trim()
        .parse::<u32>()
        .map(|n| n * multiplier)
        .map_err(|_| HostError::Create(format!("invalid memory size: {trimmed:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
.encoding = "UTF-8"
config.version = "8"
displayName = "build-agent-3"
numvcpus = "2"
memsize = "1024"
ethernet0.present = "TRUE"
ethernet0.connectionType = "bridged"
"#;

    #[test]
    fn parses_display_name_and_sizes() {
        let desc = Descriptor::parse("/vms/a/a.vmx", SAMPLE).unwrap();
        assert_eq!(desc.display_name(), Some("build-agent-3"));
        assert_eq!(desc.cpus(), Some(2));
        assert_eq!(desc.memory_mb(), Some(1024));
        assert_eq!(desc.get("ethernet0.connectiontype"), Some("bridged"));
    }

    #[test]
    fn empty_descriptor_is_corrupt() {
        let err = Descriptor::parse("/vms/bad.vmx", "").unwrap_err();
        assert!(matches!(err, HostError::Descriptor { .. }));
    }

    #[test]
    fn comment_only_descriptor_is_corrupt() {
        let err = Descriptor::parse("/vms/bad.vmx", "# nothing here\n").unwrap_err();
        assert!(matches!(err, HostError::Descriptor { .. }));
    }

    #[test]
    fn set_replaces_existing_key() {
        let mut desc = Descriptor::parse("/vms/a/a.vmx", SAMPLE).unwrap();
        desc.set("memsize", "2048");
        desc.set("tools.upgrade.policy", "manual");
        assert_eq!(desc.memory_mb(), Some(2048));
        assert_eq!(desc.get("tools.upgrade.policy"), Some("manual"));
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guest.vmx");
        let path_str = path.to_str().unwrap();

        let mut desc = Descriptor::parse(path_str, SAMPLE).unwrap();
        desc.set("displayName", "renamed");
        desc.save().unwrap();

        let reloaded = Descriptor::load(path_str).unwrap();
        assert_eq!(reloaded.display_name(), Some("renamed"));
        assert_eq!(reloaded.cpus(), Some(2));
    }

    #[test]
    fn load_missing_file_is_descriptor_error() {
        let err = Descriptor::load("/nonexistent/guest.vmx").unwrap_err();
        assert!(matches!(err, HostError::Descriptor { .. }));
    }

    #[test]
    fn memory_formats() {
        assert_eq!(parse_memory_mb("1024").unwrap(), 1024);
        assert_eq!(parse_memory_mb("1024MB").unwrap(), 1024);
        assert_eq!(parse_memory_mb("2GB").unwrap(), 2048);
        assert_eq!(parse_memory_mb(" 512 mb ").unwrap(), 512);
        assert!(parse_memory_mb("lots").is_err());
        assert!(parse_memory_mb("").is_err());
    }
}
