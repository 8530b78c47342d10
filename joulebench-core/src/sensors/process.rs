// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Process and system counter snapshots via procfs.
//!
//! One snapshot captures the system-wide CPU time breakdown from
//! `/proc/stat` plus the calling process's RSS, context-switch and
//! IO-syscall counters. Counters that cannot be read (e.g. `/proc/self/io`
//! without privilege) are left out and silently omitted from deltas.

use procfs::process::Process;
use procfs::{CurrentSI, KernelStats};

/// Point-in-time counter snapshot.
#[derive(Debug, Clone, Default)]
pub struct ProcessCounters {
    /// System-wide CPU seconds by field (`user`, `nice`, `system`, ...),
    /// in /proc/stat field order.
    pub cpu_secs: Vec<(String, f64)>,
    /// Resident set size of this process, bytes.
    pub mem_rss_bytes: Option<u64>,
    /// Voluntary context switches of this process.
    pub ctx_voluntary: Option<u64>,
    /// Involuntary context switches of this process.
    pub ctx_involuntary: Option<u64>,
    /// read(2)-style syscalls issued by this process.
    pub io_read_calls: Option<u64>,
    /// write(2)-style syscalls issued by this process.
    pub io_write_calls: Option<u64>,
}

impl ProcessCounters {
    /// Capture a snapshot for the current process.
    pub fn snapshot() -> Self {
        let mut counters = Self::default();

        if let Ok(stat) = KernelStats::current() {
            let ticks = procfs::ticks_per_second() as f64;
            let cpu = &stat.total;
            let mut push = |name: &str, value: Option<u64>| {
                if let Some(v) = value {
                    counters.cpu_secs.push((name.to_string(), v as f64 / ticks));
                }
            };
            push("user", Some(cpu.user));
            push("nice", Some(cpu.nice));
            push("system", Some(cpu.system));
            push("idle", Some(cpu.idle));
            push("iowait", cpu.iowait);
            push("irq", cpu.irq);
            push("softirq", cpu.softirq);
            push("steal", cpu.steal);
            push("guest", cpu.guest);
            push("guest_nice", cpu.guest_nice);
        }

        if let Ok(me) = Process::myself() {
            if let Ok(status) = me.status() {
                counters.mem_rss_bytes = status.vmrss.map(|kb| kb * 1024);
                counters.ctx_voluntary = status.voluntary_ctxt_switches;
                counters.ctx_involuntary = status.nonvoluntary_ctxt_switches;
            }
            if let Ok(io) = me.io() {
                counters.io_read_calls = Some(io.syscr);
                counters.io_write_calls = Some(io.syscw);
            }
        }

        counters
    }
}

/// Compute the named after-before deltas between two snapshots, in the
/// metrics-table column order. Counters missing from either snapshot are
/// omitted.
pub fn delta(before: &ProcessCounters, after: &ProcessCounters) -> Vec<(String, f64)> {
    let mut deltas = Vec::new();

    for (name, after_secs) in &after.cpu_secs {
        if let Some((_, before_secs)) = before.cpu_secs.iter().find(|(n, _)| n == name) {
            deltas.push((format!("cpu_{}", name), after_secs - before_secs));
        }
    }

    let mut push = |name: &str, b: Option<u64>, a: Option<u64>| {
        if let (Some(b), Some(a)) = (b, a) {
            deltas.push((name.to_string(), a as f64 - b as f64));
        }
    };
    push("mem_delta_bytes", before.mem_rss_bytes, after.mem_rss_bytes);
    push("ctx_voluntary", before.ctx_voluntary, after.ctx_voluntary);
    push("ctx_involuntary", before.ctx_involuntary, after.ctx_involuntary);
    push("io_read_calls", before.io_read_calls, after.io_read_calls);
    push("io_write_calls", before.io_write_calls, after.io_write_calls);

    deltas
}
