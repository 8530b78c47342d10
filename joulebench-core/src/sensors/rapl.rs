// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! RAPL energy measurement via the Linux powercap interface.
//!
//! Every zone under `/sys/class/powercap` exposing an `energy_uj` file is a
//! monotonically increasing microjoule counter (processor package, DRAM
//! controller, psys, ...). A scoped capture snapshots all zones, re-reads
//! them at the end of the region and reports the summed delta in joules.
//!
//! The counters wrap at `max_energy_range_uj`; deltas are wrap-corrected
//! when that range is readable and the zone is skipped otherwise.

use std::fs;
use std::path::{Path, PathBuf};

/// Default powercap sysfs root.
pub const POWERCAP_ROOT: &str = "/sys/class/powercap";

/// One powercap energy domain.
#[derive(Debug, Clone)]
pub struct PowercapZone {
    /// Zone name (sysfs directory basename, e.g. `intel-rapl:0`).
    pub name: String,
    energy_path: PathBuf,
    max_range_uj: Option<u64>,
}

impl PowercapZone {
    fn read_energy_uj(&self) -> Option<u64> {
        read_u64(&self.energy_path)
    }
}

fn read_u64(path: &Path) -> Option<u64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Scan a powercap root for energy domains.
pub fn discover_zones_in(root: &Path) -> Vec<PowercapZone> {
    let mut zones = Vec::new();
    let Ok(entries) = fs::read_dir(root) else {
        return zones;
    };
    for entry in entries.flatten() {
        let dir = entry.path();
        let energy_path = dir.join("energy_uj");
        if !energy_path.is_file() {
            continue;
        }
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let max_range_uj = read_u64(&dir.join("max_energy_range_uj"));
        zones.push(PowercapZone {
            name,
            energy_path,
            max_range_uj,
        });
    }
    zones.sort_by(|a, b| a.name.cmp(&b.name));
    zones
}

/// Scan `/sys/class/powercap` for energy domains.
pub fn discover_zones() -> Vec<PowercapZone> {
    discover_zones_in(Path::new(POWERCAP_ROOT))
}

/// Scoped energy meter over a fixed set of powercap zones.
///
/// Only one capture may be active per process at a time: overlapping
/// captures on the same hardware counter read the same deltas twice.
/// Serialization is the caller's responsibility (`Profiler` holds the
/// capture gate).
#[derive(Debug)]
pub struct EnergyMeter {
    zones: Vec<PowercapZone>,
}

impl EnergyMeter {
    /// Build a meter over the zones present on this machine. Finding no
    /// zones is not an error; captures will read 0.0 J and warn.
    pub fn probe() -> Self {
        Self::from_zones(discover_zones())
    }

    /// Build a meter over an explicit zone set.
    pub fn from_zones(zones: Vec<PowercapZone>) -> Self {
        Self { zones }
    }

    /// Number of readable energy domains.
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Begin a capture for a named region.
    pub fn start(&self, region: impl Into<String>) -> EnergyCapture<'_> {
        let before = self.zones.iter().map(|z| z.read_energy_uj()).collect();
        EnergyCapture {
            zones: &self.zones,
            region: region.into(),
            before,
        }
    }
}

/// An in-flight energy capture. Dropping it without calling
/// [`EnergyCapture::finish`] discards the reading; no hardware state is
/// held between the two edges.
#[derive(Debug)]
pub struct EnergyCapture<'a> {
    zones: &'a [PowercapZone],
    region: String,
    before: Vec<Option<u64>>,
}

impl EnergyCapture<'_> {
    /// End the capture and return joules consumed across all domains.
    ///
    /// A total of exactly 0.0 J usually means missing privilege or
    /// unsupported hardware; it is reported as a warning and returned
    /// as-is.
    pub fn finish(self) -> f64 {
        let mut total_uj: u64 = 0;
        for (zone, before) in self.zones.iter().zip(self.before.iter()) {
            let (Some(before), Some(after)) = (*before, zone.read_energy_uj()) else {
                continue;
            };
            let delta = if after >= before {
                after - before
            } else {
                // Counter wrapped; correct against the zone range if known.
                match zone.max_range_uj {
                    Some(range) => range.saturating_sub(before).saturating_add(after),
                    None => continue,
                }
            };
            total_uj = total_uj.saturating_add(delta);
        }
        if total_uj == 0 {
            tracing::warn!(
                region = %self.region,
                "energy capture read 0.0 J; missing permissions or unsupported hardware?"
            );
        }
        total_uj as f64 / 1e6
    }

    /// Name of the region being measured.
    pub fn region(&self) -> &str {
        &self.region
    }
}
