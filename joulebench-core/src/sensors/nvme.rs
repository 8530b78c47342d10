// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! NVMe SMART log counters.
//!
//! Namespaces are discovered under `/sys/class/nvme`; counters come from
//! `nvme smart-log --output-format=json`. A missing `nvme` binary, missing
//! privilege or an unparseable log simply yields no counters for that
//! device.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Default NVMe controller sysfs root.
pub const NVME_CLASS_ROOT: &str = "/sys/class/nvme";

/// Detect NVMe namespace block devices, returning `/dev` paths.
pub fn detect_namespaces_in(sys_root: &Path, dev_root: &Path) -> Vec<PathBuf> {
    let mut devices = Vec::new();
    let Ok(controllers) = fs::read_dir(sys_root) else {
        return devices;
    };
    for ctrl in controllers.flatten() {
        let ctrl_name = ctrl.file_name().to_string_lossy().into_owned();
        if !ctrl_name.starts_with("nvme") {
            continue;
        }
        let Ok(entries) = fs::read_dir(ctrl.path()) else {
            continue;
        };
        for entry in entries.flatten() {
            let ns_name = entry.file_name().to_string_lossy().into_owned();
            // Namespaces look like nvme0n1, nvme0n2, ...
            if !ns_name.starts_with(&format!("{}n", ctrl_name)) {
                continue;
            }
            let dev = dev_root.join(&ns_name);
            if dev.exists() {
                devices.push(dev);
            }
        }
    }
    devices.sort();
    devices
}

/// Detect NVMe namespaces on this machine.
pub fn detect_namespaces() -> Vec<PathBuf> {
    detect_namespaces_in(Path::new(NVME_CLASS_ROOT), Path::new("/dev"))
}

/// Extract `(data_units_read, data_units_written)` from a SMART log in
/// JSON form.
pub fn parse_smart_log(json: &str) -> Option<(u64, u64)> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    let read = value.get("data_units_read")?.as_u64()?;
    let written = value.get("data_units_written")?.as_u64()?;
    Some((read, written))
}

/// Sensor over the NVMe namespaces present at detection time.
#[derive(Debug)]
pub struct NvmeSensor {
    devices: Vec<PathBuf>,
}

impl NvmeSensor {
    /// Detect namespaces once; counters are read per snapshot.
    pub fn detect() -> Self {
        Self {
            devices: detect_namespaces(),
        }
    }

    /// Sensor over an explicit device list.
    pub fn with_devices(devices: Vec<PathBuf>) -> Self {
        Self { devices }
    }

    /// Devices this sensor reads.
    pub fn devices(&self) -> &[PathBuf] {
        &self.devices
    }

    /// Read SMART data-unit counters for each device. Devices whose log
    /// cannot be retrieved are skipped.
    pub fn read_counters(&self) -> BTreeMap<String, u64> {
        let mut counters = BTreeMap::new();
        for dev in &self.devices {
            let Ok(output) = Command::new("nvme")
                .args(["smart-log", "--output-format=json"])
                .arg(dev)
                .output()
            else {
                continue;
            };
            if !output.status.success() {
                continue;
            }
            let Ok(json) = String::from_utf8(output.stdout) else {
                continue;
            };
            let Some((read, written)) = parse_smart_log(&json) else {
                continue;
            };
            let base = dev
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            counters.insert(format!("nvme_{}_data_units_read", base), read);
            counters.insert(format!("nvme_{}_data_units_written", base), written);
        }
        counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_smart_log() {
        let json = r#"{
            "critical_warning": 0,
            "temperature": 312,
            "data_units_read": 6140552,
            "data_units_written": 9841374,
            "host_read_commands": 80430925
        }"#;
        assert_eq!(parse_smart_log(json), Some((6_140_552, 9_841_374)));
    }

    #[test]
    fn test_parse_smart_log_missing_fields() {
        assert_eq!(parse_smart_log(r#"{"temperature": 300}"#), None);
        assert_eq!(parse_smart_log("not json"), None);
    }

    #[test]
    fn test_detect_namespaces() {
        let tmp = TempDir::new().unwrap();
        let sys = tmp.path().join("sys");
        let dev = tmp.path().join("dev");
        fs::create_dir_all(sys.join("nvme0").join("nvme0n1")).unwrap();
        fs::create_dir_all(sys.join("nvme0").join("firmware")).unwrap();
        fs::create_dir_all(sys.join("nvme1").join("nvme1n1")).unwrap();
        fs::create_dir_all(&dev).unwrap();
        // Only nvme0n1 has a /dev node.
        fs::write(dev.join("nvme0n1"), b"").unwrap();

        let found = detect_namespaces_in(&sys, &dev);
        assert_eq!(found, vec![dev.join("nvme0n1")]);
    }

    #[test]
    fn test_missing_sys_root() {
        let tmp = TempDir::new().unwrap();
        assert!(detect_namespaces_in(Path::new("/nonexistent"), tmp.path()).is_empty());
    }
}
