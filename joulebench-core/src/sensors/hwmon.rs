// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! hwmon sensor discovery.
//!
//! Scans `/sys/class/hwmon` for voltage, current, power and temperature
//! inputs. Used by the CLI sensor probe; hwmon values are instantaneous
//! readings and are not folded into trial metrics.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default hwmon sysfs root.
pub const HWMON_ROOT: &str = "/sys/class/hwmon";

const INPUT_PREFIXES: [&str; 4] = ["in", "curr", "power", "temp"];

/// One discovered hwmon input channel.
#[derive(Debug, Clone)]
pub struct HwmonSensor {
    /// Chip name (contents of the `name` file, or the directory basename).
    pub chip: String,
    /// Channel label, e.g. `temp1`, `power2`.
    pub label: String,
    path: PathBuf,
}

impl HwmonSensor {
    /// Read the channel's current raw value.
    pub fn read(&self) -> Option<i64> {
        fs::read_to_string(&self.path).ok()?.trim().parse().ok()
    }

    /// Stable key combining chip and channel, e.g. `coretemp_temp1`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.chip, self.label)
    }
}

fn is_input_channel(file_name: &str) -> bool {
    let Some(stem) = file_name.strip_suffix("_input") else {
        return false;
    };
    INPUT_PREFIXES
        .iter()
        .any(|p| stem.starts_with(p) && stem[p.len()..].chars().all(|c| c.is_ascii_digit()))
}

/// Scan an hwmon root for input channels.
pub fn discover_sensors_in(root: &Path) -> Vec<HwmonSensor> {
    let mut sensors = Vec::new();
    let Ok(entries) = fs::read_dir(root) else {
        return sensors;
    };
    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let chip = fs::read_to_string(dir.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| {
                dir.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
        let Ok(files) = fs::read_dir(&dir) else {
            continue;
        };
        for file in files.flatten() {
            let name = file.file_name().to_string_lossy().into_owned();
            if is_input_channel(&name) {
                sensors.push(HwmonSensor {
                    chip: chip.clone(),
                    label: name.trim_end_matches("_input").to_string(),
                    path: file.path(),
                });
            }
        }
    }
    sensors.sort_by(|a, b| a.key().cmp(&b.key()));
    sensors
}

/// Scan `/sys/class/hwmon` for input channels.
pub fn discover_sensors() -> Vec<HwmonSensor> {
    discover_sensors_in(Path::new(HWMON_ROOT))
}

/// Read every discovered channel into a key -> value map. Unreadable
/// channels are skipped.
pub fn read_sensors(sensors: &[HwmonSensor]) -> BTreeMap<String, i64> {
    sensors
        .iter()
        .filter_map(|s| Some((s.key(), s.read()?)))
        .collect()
}
