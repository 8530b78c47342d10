// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Host information captured for the run banner.

use std::fmt;

use sysinfo::System;

/// System information at run time.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub os: String,
    pub os_version: String,
    pub kernel_version: Option<String>,
    pub cpu_model: String,
    pub cpu_cores: usize,
    pub memory_bytes: u64,
    pub hostname: String,
}

impl HostInfo {
    /// Collect current host information.
    pub fn collect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            os: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {}{}) - {} x{}, {:.1} GiB RAM",
            self.hostname,
            self.os,
            self.os_version,
            self.kernel_version
                .as_deref()
                .map(|k| format!(", kernel {}", k))
                .unwrap_or_default(),
            self.cpu_model,
            self.cpu_cores,
            self.memory_bytes as f64 / (1024.0 * 1024.0 * 1024.0),
        )
    }
}
