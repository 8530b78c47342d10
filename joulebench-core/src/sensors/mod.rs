// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Point-in-time sensor readers.
//!
//! Every reader yields an optional snapshot: a sensor that cannot be read
//! (hardware absent, missing privilege, tool not installed) is skipped, it
//! never fails a trial.

pub mod battery;
pub mod hwmon;
pub mod nvme;
pub mod process;
pub mod rapl;

pub use battery::read_battery_charge;
pub use hwmon::HwmonSensor;
pub use nvme::NvmeSensor;
pub use process::ProcessCounters;
pub use rapl::{EnergyCapture, EnergyMeter, PowercapZone};
