// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Battery charge reader.

use std::fs;
use std::path::Path;

/// Charge counter of the primary battery, in microampere-hours.
pub const BATTERY_CHARGE_PATH: &str = "/sys/class/power_supply/BAT0/charge_now";

/// Read the current battery charge in uAh, if a battery is present.
pub fn read_battery_charge() -> Option<i64> {
    read_charge_from(Path::new(BATTERY_CHARGE_PATH))
}

/// Read a charge counter from an explicit path.
pub fn read_charge_from(path: &Path) -> Option<i64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}
