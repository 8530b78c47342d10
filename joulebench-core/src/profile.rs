// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Function-level energy/time profiling.
//!
//! A [`Profiler`] wraps individual operations in a scoped energy capture
//! and a wall-clock timer, then pushes one [`FunctionProfileRecord`] per
//! call into its [`RecordStore`]. The store is explicit and injectable:
//! the process that will aggregate results uses an in-memory store, while
//! spawned worker processes (which share no memory with the aggregator)
//! are handed a record directory and serialize every record to its own
//! file there. Harvesting reads both.
//!
//! Record files are written to a `.tmp` name and renamed to `.json` once
//! complete; the rename is the completion marker, so a harvest or clear
//! racing a mid-write worker only ever sees finished records.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::sensors::rapl::EnergyMeter;

/// One profiled call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionProfileRecord {
    /// Identity of the profiled operation.
    pub func_name: String,
    /// Joules consumed during the call.
    pub energy_j: f64,
    /// Wall-clock duration of the call, nanoseconds.
    pub elapsed_ns: u64,
}

/// One profiled call with its argument snapshot and return value.
/// In-process only; there is no cross-process variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedProfileRecord {
    pub func_name: String,
    pub args: serde_json::Value,
    pub output: serde_json::Value,
    pub energy_j: f64,
    pub elapsed_ns: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where profile records accumulate until harvested.
///
/// With a record directory configured, every record becomes its own
/// uniquely-named JSON file (pid + timestamp + sequence number keeps
/// concurrently-writing processes from colliding); otherwise records are
/// appended to an in-process ordered list.
#[derive(Debug)]
pub struct RecordStore {
    records: Mutex<Vec<FunctionProfileRecord>>,
    record_dir: Option<PathBuf>,
    seq: AtomicU64,
}

impl RecordStore {
    /// Store records in an in-process list.
    pub fn in_memory() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            record_dir: None,
            seq: AtomicU64::new(0),
        }
    }

    /// Serialize each record to its own file under `dir`. Used both by the
    /// aggregating process during a trial and by worker processes that
    /// were handed the directory path.
    pub fn with_record_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            record_dir: Some(dir.into()),
            seq: AtomicU64::new(0),
        }
    }

    /// The configured record directory, if any.
    pub fn record_dir(&self) -> Option<&Path> {
        self.record_dir.as_deref()
    }

    /// Append a record. A failed file write is logged and the record is
    /// dropped; the caller's workload is never interrupted.
    pub fn push(&self, record: FunctionProfileRecord) {
        match &self.record_dir {
            Some(dir) => {
                let seq = self.seq.fetch_add(1, Ordering::Relaxed);
                if let Err(err) = write_record_file(dir, &record, seq) {
                    tracing::warn!(
                        dir = %dir.display(),
                        func = %record.func_name,
                        error = %err,
                        "could not persist profile record; dropping it"
                    );
                }
            }
            None => lock(&self.records).push(record),
        }
    }

    /// All records accumulated since the last clear: the in-process list
    /// plus, when a directory is configured, every completed record file
    /// currently in it. Unparseable files are skipped with a warning.
    pub fn harvest(&self) -> Vec<FunctionProfileRecord> {
        let mut records = lock(&self.records).clone();
        if let Some(dir) = &self.record_dir {
            for path in record_files(dir) {
                match std::fs::read_to_string(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
                {
                    Ok(record) => records.push(record),
                    Err(err) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %err,
                            "skipping unreadable profile record file"
                        );
                    }
                }
            }
        }
        records
    }

    /// Empty the in-process list and delete every record file (including
    /// stale temporaries) in the directory.
    pub fn clear(&self) {
        lock(&self.records).clear();
        if let Some(dir) = &self.record_dir {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let ext = path.extension().and_then(|e| e.to_str());
                if matches!(ext, Some("json") | Some("tmp")) {
                    let _ = std::fs::remove_file(&path);
                }
            }
        }
    }
}

fn record_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    files
}

fn write_record_file(
    dir: &Path,
    record: &FunctionProfileRecord,
    seq: u64,
) -> Result<(), std::io::Error> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let final_path = dir.join(format!("prof_{}_{}_{}.json", std::process::id(), nanos, seq));
    let tmp_path = final_path.with_extension("tmp");
    let json = serde_json::to_vec(record)?;
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, &final_path)
}

/// Wraps operations in an energy capture and a timer, recording one
/// [`FunctionProfileRecord`] per call.
///
/// The capture gate makes "begin capture, run the call, end capture" one
/// critical section: the hardware energy counter is a singleton, so
/// concurrently-running profiled calls are serialized onto it. The return
/// value of the measured closure is passed through unchanged; a record is
/// emitted whether or not that value is an error.
#[derive(Debug)]
pub struct Profiler {
    store: Arc<RecordStore>,
    meter: EnergyMeter,
    gate: Mutex<()>,
    detailed: Mutex<Vec<DetailedProfileRecord>>,
}

impl Profiler {
    /// Build a profiler over the zones present on this machine.
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self::with_meter(store, EnergyMeter::probe())
    }

    /// Build a profiler with an explicit meter.
    pub fn with_meter(store: Arc<RecordStore>, meter: EnergyMeter) -> Self {
        Self {
            store,
            meter,
            gate: Mutex::new(()),
            detailed: Mutex::new(Vec::new()),
        }
    }

    /// The record store this profiler feeds.
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Measure one call. Serialized against all other gated measurements
    /// in this process.
    pub fn measure<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let (result, energy_j, elapsed_ns) = {
            let _gate = lock(&self.gate);
            self.timed_capture(name, f)
        };
        self.store.push(FunctionProfileRecord {
            func_name: name.to_string(),
            energy_j,
            elapsed_ns,
        });
        result
    }

    /// Measure one future. This path does not take the capture gate (a
    /// sync lock cannot be held across an await point); the caller must
    /// ensure no other profiled call overlaps the measured region.
    pub async fn measure_async<T>(&self, name: &str, fut: impl Future<Output = T>) -> T {
        let capture = self.meter.start(name);
        let start = Instant::now();
        let result = fut.await;
        let elapsed_ns = start.elapsed().as_nanos() as u64;
        let energy_j = capture.finish();
        self.store.push(FunctionProfileRecord {
            func_name: name.to_string(),
            energy_j,
            elapsed_ns,
        });
        result
    }

    /// Measure one call, additionally capturing its argument snapshot and
    /// return value into the in-process detailed list. Detailed records
    /// are not harvested into trials.
    pub fn measure_detailed<A, T>(&self, name: &str, args: &A, f: impl FnOnce() -> T) -> T
    where
        A: Serialize,
        T: Serialize,
    {
        let (result, energy_j, elapsed_ns) = {
            let _gate = lock(&self.gate);
            self.timed_capture(name, f)
        };
        let record = DetailedProfileRecord {
            func_name: name.to_string(),
            args: serde_json::to_value(args).unwrap_or(serde_json::Value::Null),
            output: serde_json::to_value(&result).unwrap_or(serde_json::Value::Null),
            energy_j,
            elapsed_ns,
        };
        lock(&self.detailed).push(record);
        result
    }

    fn timed_capture<T>(&self, name: &str, f: impl FnOnce() -> T) -> (T, f64, u64) {
        let capture = self.meter.start(name);
        let start = Instant::now();
        let result = f();
        let elapsed_ns = start.elapsed().as_nanos() as u64;
        let energy_j = capture.finish();
        (result, energy_j, elapsed_ns)
    }

    /// Detailed records accumulated so far.
    pub fn detailed_records(&self) -> Vec<DetailedProfileRecord> {
        lock(&self.detailed).clone()
    }

    /// Drop all detailed records.
    pub fn clear_detailed(&self) {
        lock(&self.detailed).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn quiet_profiler(store: Arc<RecordStore>) -> Profiler {
        // No powercap zones in the test environment; energy reads 0.0.
        Profiler::with_meter(store, EnergyMeter::from_zones(Vec::new()))
    }

    #[test]
    fn test_in_memory_push_harvest_clear() {
        let store = RecordStore::in_memory();
        store.push(FunctionProfileRecord {
            func_name: "f".to_string(),
            energy_j: 0.5,
            elapsed_ns: 10,
        });
        assert_eq!(store.harvest().len(), 1);
        // Harvest is non-destructive.
        assert_eq!(store.harvest().len(), 1);
        store.clear();
        assert!(store.harvest().is_empty());
    }

    #[test]
    fn test_directory_store_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::with_record_dir(tmp.path());
        for i in 0..3 {
            store.push(FunctionProfileRecord {
                func_name: format!("f{}", i),
                energy_j: i as f64,
                elapsed_ns: i,
            });
        }
        let harvested = store.harvest();
        assert_eq!(harvested.len(), 3);
        // No stray temporaries left behind.
        assert!(!tmp
            .path()
            .read_dir()
            .unwrap()
            .flatten()
            .any(|e| e.path().extension().is_some_and(|x| x == "tmp")));
        store.clear();
        assert!(store.harvest().is_empty());
    }

    #[test]
    fn test_two_stores_one_directory() {
        // Two worker processes sharing a record directory are modeled by
        // two independent stores; filename uniqueness keeps them apart.
        let tmp = TempDir::new().unwrap();
        let a = RecordStore::with_record_dir(tmp.path());
        let b = RecordStore::with_record_dir(tmp.path());
        for _ in 0..5 {
            a.push(FunctionProfileRecord {
                func_name: "a".to_string(),
                energy_j: 0.0,
                elapsed_ns: 1,
            });
            b.push(FunctionProfileRecord {
                func_name: "b".to_string(),
                energy_j: 0.0,
                elapsed_ns: 1,
            });
        }
        assert_eq!(a.harvest().len(), 10);
    }

    #[test]
    fn test_unparseable_record_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::with_record_dir(tmp.path());
        store.push(FunctionProfileRecord {
            func_name: "ok".to_string(),
            energy_j: 0.0,
            elapsed_ns: 1,
        });
        std::fs::write(tmp.path().join("prof_0_0_0.json"), "{broken").unwrap();
        assert_eq!(store.harvest().len(), 1);
    }

    #[test]
    fn test_measure_passes_value_through_and_records() {
        let store = Arc::new(RecordStore::in_memory());
        let profiler = quiet_profiler(Arc::clone(&store));
        let out = profiler.measure("answer", || 41 + 1);
        assert_eq!(out, 42);
        let records = store.harvest();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].func_name, "answer");
        assert!(records[0].energy_j >= 0.0);
    }

    #[test]
    fn test_measure_records_even_on_error() {
        let store = Arc::new(RecordStore::in_memory());
        let profiler = quiet_profiler(Arc::clone(&store));
        let out: Result<(), String> = profiler.measure("failing", || Err("boom".to_string()));
        assert!(out.is_err());
        assert_eq!(store.harvest().len(), 1);
    }

    #[test]
    fn test_measure_from_threads() {
        let store = Arc::new(RecordStore::in_memory());
        let profiler = quiet_profiler(Arc::clone(&store));
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..10 {
                        profiler.measure("spin", || std::hint::black_box(1 + 1));
                    }
                });
            }
        });
        assert_eq!(store.harvest().len(), 40);
    }

    #[test]
    fn test_measure_detailed_captures_args_and_output() {
        let store = Arc::new(RecordStore::in_memory());
        let profiler = quiet_profiler(Arc::clone(&store));
        let out = profiler.measure_detailed("doubled", &7u32, || 14u32);
        assert_eq!(out, 14);
        // Detailed records stay out of the standard sink.
        assert!(store.harvest().is_empty());
        let detailed = profiler.detailed_records();
        assert_eq!(detailed.len(), 1);
        assert_eq!(detailed[0].args, serde_json::json!(7));
        assert_eq!(detailed[0].output, serde_json::json!(14));
        profiler.clear_detailed();
        assert!(profiler.detailed_records().is_empty());
    }
}
