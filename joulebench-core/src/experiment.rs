// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Experiment lifecycle: one `setup`, then repeatable measured trials.
//!
//! A trial brackets the workload with before/after snapshots of battery
//! charge, the system CPU time breakdown, process RSS/context-switch/IO
//! counters and NVMe SMART counters, optionally wraps the whole workload
//! in its own energy capture, and harvests every profile record produced
//! anywhere (including worker-process record files) during that single
//! invocation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{BenchError, BenchResult};
use crate::metrics::MetricSet;
use crate::profile::{FunctionProfileRecord, Profiler, RecordStore};
use crate::sensors::battery::read_battery_charge;
use crate::sensors::nvme::NvmeSensor;
use crate::sensors::process::{self, ProcessCounters};
use crate::sensors::rapl::EnergyMeter;
use crate::types::TrialId;

/// Static configuration of an experiment.
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    /// Scratch directory; the per-trial record directory lives under it.
    pub work_dir: PathBuf,
    /// Metrics table destination; the function and call tables derive
    /// their paths from it.
    pub output: PathBuf,
    /// Wrap the whole workload in its own energy capture.
    pub measure_total_run: bool,
}

impl ExperimentConfig {
    pub fn new(work_dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            output: output.into(),
            measure_total_run: true,
        }
    }

    pub fn measure_total_run(mut self, measure: bool) -> Self {
        self.measure_total_run = measure;
        self
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self::new("/tmp", "results.csv")
    }
}

/// Per-trial instrumentation handle passed to the workload.
///
/// Workloads call [`Probe::profiler`] around the code they want measured
/// and forward [`Probe::record_dir`] to any worker processes they spawn,
/// so the workers' profilers write into the same harvest directory.
#[derive(Debug)]
pub struct Probe {
    profiler: Profiler,
    record_dir: PathBuf,
}

impl Probe {
    /// Build a probe whose records accumulate under `record_dir`.
    pub fn new(record_dir: impl Into<PathBuf>) -> Self {
        let record_dir = record_dir.into();
        let store = Arc::new(RecordStore::with_record_dir(&record_dir));
        Self {
            profiler: Profiler::new(store),
            record_dir,
        }
    }

    /// The profiler measuring this trial's calls.
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    /// Directory to hand to spawned worker processes.
    pub fn record_dir(&self) -> &Path {
        &self.record_dir
    }

    fn clear_records(&self) {
        self.profiler.store().clear();
    }

    fn harvest_records(&self) -> Vec<FunctionProfileRecord> {
        self.profiler.store().harvest()
    }
}

/// The unit of measurement: a one-time setup and a repeatable workload.
///
/// Workload failures propagate out of the trial uncaught; trials are not
/// retried at this layer.
pub trait Experiment {
    /// Region name used for the whole-workload energy capture.
    fn name(&self) -> &str;

    /// Static configuration.
    fn config(&self) -> &ExperimentConfig;

    /// Runs exactly once before any trial. Prepares durable prerequisites;
    /// must not touch profiling state.
    fn setup(&mut self) -> anyhow::Result<()>;

    /// One workload execution. Call `probe.profiler()` around the regions
    /// to be measured.
    fn run_workload(&mut self, probe: &Probe) -> anyhow::Result<()>;
}

/// Result of one trial.
#[derive(Debug, Clone)]
pub struct TrialResult {
    /// Correlation id linking this trial's rows across all tables.
    pub trial_id: TrialId,
    /// Counter deltas plus whole-run energy and elapsed time.
    pub metrics: MetricSet,
    /// Every profile record harvested during this trial, in sink order.
    pub records: Vec<FunctionProfileRecord>,
}

/// Run a single trial of an experiment.
pub fn run_trial<E: Experiment + ?Sized>(exp: &mut E) -> BenchResult<TrialResult> {
    let config = exp.config().clone();
    fs::create_dir_all(&config.work_dir).map_err(|source| BenchError::Io {
        context: "creating work directory",
        source,
    })?;
    let record_dir = config.work_dir.join("records");
    fs::create_dir_all(&record_dir).map_err(|source| BenchError::Io {
        context: "creating record directory",
        source,
    })?;

    let probe = Probe::new(&record_dir);
    probe.clear_records();

    // Snapshots before
    let charge_before = read_battery_charge();
    let proc_before = ProcessCounters::snapshot();
    let nvme = NvmeSensor::detect();
    let nvme_before = nvme.read_counters();

    let (run_energy_j, run_elapsed_ns) = if config.measure_total_run {
        let meter = EnergyMeter::probe();
        let capture = meter.start(exp.name());
        let start = Instant::now();
        exp.run_workload(&probe)
            .map_err(|source| BenchError::Workload { source })?;
        let elapsed_ns = start.elapsed().as_nanos() as u64;
        (capture.finish(), elapsed_ns)
    } else {
        let start = Instant::now();
        exp.run_workload(&probe)
            .map_err(|source| BenchError::Workload { source })?;
        (0.0, start.elapsed().as_nanos() as u64)
    };

    // Snapshots after
    let charge_after = read_battery_charge();
    let proc_after = ProcessCounters::snapshot();
    let nvme_after = nvme.read_counters();

    let mut metrics = MetricSet::new();
    metrics.insert("energy_j", run_energy_j);
    metrics.insert("elapsed_ns", run_elapsed_ns as f64);
    metrics.extend(process::delta(&proc_before, &proc_after));
    for (key, before) in &nvme_before {
        if let Some(after) = nvme_after.get(key) {
            metrics.insert(format!("{}_delta", key), *after as f64 - *before as f64);
        }
    }
    if let (Some(before), Some(after)) = (charge_before, charge_after) {
        metrics.insert("battery_uah_delta", (after - before) as f64);
    }

    let records = probe.harvest_records();

    Ok(TrialResult {
        trial_id: TrialId::new(),
        metrics,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingExperiment {
        config: ExperimentConfig,
        calls_per_trial: usize,
        fail: bool,
    }

    impl CountingExperiment {
        fn new(work_dir: &Path) -> Self {
            Self {
                config: ExperimentConfig::new(work_dir, work_dir.join("out.csv"))
                    .measure_total_run(false),
                calls_per_trial: 3,
                fail: false,
            }
        }
    }

    impl Experiment for CountingExperiment {
        fn name(&self) -> &str {
            "counting"
        }

        fn config(&self) -> &ExperimentConfig {
            &self.config
        }

        fn setup(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn run_workload(&mut self, probe: &Probe) -> anyhow::Result<()> {
            for _ in 0..self.calls_per_trial {
                probe.profiler().measure("noop", || {});
            }
            if self.fail {
                anyhow::bail!("synthetic workload failure");
            }
            Ok(())
        }
    }

    #[test]
    fn test_trial_harvests_exactly_its_records() {
        let tmp = tempfile::TempDir::new().unwrap();
        // A stale record from a previous (crashed) trial must not leak in.
        let record_dir = tmp.path().join("records");
        fs::create_dir_all(&record_dir).unwrap();
        fs::write(
            record_dir.join("prof_999_0_0.json"),
            r#"{"func_name":"stale","energy_j":0.0,"elapsed_ns":1}"#,
        )
        .unwrap();

        let mut exp = CountingExperiment::new(tmp.path());
        let trial = run_trial(&mut exp).unwrap();
        assert_eq!(trial.records.len(), 3);
        assert!(trial.records.iter().all(|r| r.func_name == "noop"));
    }

    #[test]
    fn test_trial_metrics_have_fixed_leading_keys() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut exp = CountingExperiment::new(tmp.path());
        let trial = run_trial(&mut exp).unwrap();
        let keys: Vec<&str> = trial.metrics.keys().collect();
        assert_eq!(keys[0], "energy_j");
        assert_eq!(keys[1], "elapsed_ns");
        assert_eq!(trial.metrics.get("energy_j"), Some(0.0));
        assert!(trial.metrics.get("elapsed_ns").unwrap() >= 0.0);
    }

    #[test]
    fn test_trial_records_have_nonnegative_measurements() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut exp = CountingExperiment::new(tmp.path());
        let trial = run_trial(&mut exp).unwrap();
        for record in &trial.records {
            assert!(record.energy_j >= 0.0);
        }
    }

    #[test]
    fn test_workload_failure_propagates() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut exp = CountingExperiment::new(tmp.path());
        exp.fail = true;
        let err = run_trial(&mut exp).unwrap_err();
        assert!(matches!(err, BenchError::Workload { .. }));
    }

    #[test]
    fn test_consecutive_trials_do_not_leak_records() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut exp = CountingExperiment::new(tmp.path());
        let first = run_trial(&mut exp).unwrap();
        let second = run_trial(&mut exp).unwrap();
        assert_eq!(first.records.len(), 3);
        assert_eq!(second.records.len(), 3);
        assert_ne!(first.trial_id, second.trial_id);
    }
}
