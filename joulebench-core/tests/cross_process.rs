// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Cross-process record sink validation.
//!
//! The parent re-executes this test binary as two worker processes (the
//! usual self-exec trick), each making five profiled calls into a shared
//! record directory with no memory shared with the parent. The parent then
//! harvests the directory.

use std::process::Command;
use std::sync::Arc;

use joulebench_core::{EnergyMeter, Profiler, RecordStore};

const RECORD_DIR_VAR: &str = "JOULEBENCH_TEST_RECORD_DIR";

/// Worker entry: only does real work when re-executed with the record
/// directory set; as part of a normal test run it is a no-op.
#[test]
fn emit_records_when_directed() {
    let Some(dir) = std::env::var_os(RECORD_DIR_VAR) else {
        return;
    };
    let store = Arc::new(RecordStore::with_record_dir(dir));
    let profiler = Profiler::with_meter(store, EnergyMeter::probe());
    for i in 0..5 {
        profiler.measure("worker_call", || std::hint::black_box(i * i));
    }
}

#[test]
fn two_worker_processes_yield_ten_records() {
    let dir = tempfile::TempDir::new().unwrap();
    let exe = std::env::current_exe().unwrap();

    let mut children = Vec::new();
    for _ in 0..2 {
        let child = Command::new(&exe)
            .args(["emit_records_when_directed", "--exact", "--nocapture"])
            .env(RECORD_DIR_VAR, dir.path())
            .spawn()
            .expect("spawning worker test process");
        children.push(child);
    }
    for mut child in children {
        let status = child.wait().unwrap();
        assert!(status.success(), "worker exited with {}", status);
    }

    let store = RecordStore::with_record_dir(dir.path());
    let records = store.harvest();
    assert_eq!(records.len(), 10);
    assert!(records.iter().all(|r| r.func_name == "worker_call"));
    assert!(records.iter().all(|r| r.energy_j >= 0.0));

    store.clear();
    assert!(store.harvest().is_empty());
}
