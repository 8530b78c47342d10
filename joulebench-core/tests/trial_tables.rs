// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end orchestrator runs against real table files.

use std::path::{Path, PathBuf};

use joulebench_core::{
    run_experiment, BenchError, Experiment, ExperimentConfig, Probe, TrialId,
};
use tempfile::TempDir;

struct NoopCallsExperiment {
    config: ExperimentConfig,
    calls_per_trial: usize,
    fail_on_trial: Option<usize>,
    trials_started: usize,
}

impl NoopCallsExperiment {
    fn new(work_dir: &Path, output: PathBuf, calls_per_trial: usize) -> Self {
        Self {
            config: ExperimentConfig::new(work_dir, output).measure_total_run(false),
            calls_per_trial,
            fail_on_trial: None,
            trials_started: 0,
        }
    }
}

impl Experiment for NoopCallsExperiment {
    fn name(&self) -> &str {
        "noop_calls"
    }

    fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    fn setup(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn run_workload(&mut self, probe: &Probe) -> anyhow::Result<()> {
        self.trials_started += 1;
        if self.fail_on_trial == Some(self.trials_started) {
            anyhow::bail!("trial {} exploded", self.trials_started);
        }
        for _ in 0..self.calls_per_trial {
            probe.profiler().measure("noop", || {});
        }
        Ok(())
    }
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn single_trial_three_calls() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("results.csv");
    let mut exp = NoopCallsExperiment::new(tmp.path(), output, 3);

    let summary = run_experiment(&mut exp, 1, false).unwrap();
    assert_eq!(summary.trial_ids.len(), 1);

    let metrics = lines(&summary.tables.metrics);
    assert_eq!(metrics.len(), 2);
    assert!(metrics[0].starts_with("trial_id,energy_j,elapsed_ns"));

    let functions = lines(&summary.tables.functions);
    assert_eq!(functions.len(), 2);
    let fields: Vec<&str> = functions[1].split(',').collect();
    assert_eq!(fields[1], "noop");
    assert_eq!(fields[2], "3"); // call count

    let calls = lines(&summary.tables.calls);
    assert_eq!(calls.len(), 4); // header + one row per call
}

#[test]
fn n_trials_yield_n_distinct_correlated_ids() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("results.csv");
    let mut exp = NoopCallsExperiment::new(tmp.path(), output, 2);

    let summary = run_experiment(&mut exp, 4, false).unwrap();
    let ids: Vec<String> = summary.trial_ids.iter().map(TrialId::to_string).collect();
    assert_eq!(ids.len(), 4);
    let unique: std::collections::HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), 4);

    let metrics = lines(&summary.tables.metrics);
    let functions = lines(&summary.tables.functions);
    let calls = lines(&summary.tables.calls);
    for id in &ids {
        assert_eq!(metrics.iter().filter(|l| l.starts_with(id.as_str())).count(), 1);
        assert_eq!(
            functions.iter().filter(|l| l.starts_with(id.as_str())).count(),
            1
        );
        // One call-detail row per call made in that trial.
        assert_eq!(calls.iter().filter(|l| l.starts_with(id.as_str())).count(), 2);
    }
}

#[test]
fn function_summary_matches_sum_of_calls() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("results.csv");
    let mut exp = NoopCallsExperiment::new(tmp.path(), output, 5);

    let summary = run_experiment(&mut exp, 1, false).unwrap();
    let functions = lines(&summary.tables.functions);
    let calls = lines(&summary.tables.calls);

    let fields: Vec<&str> = functions[1].split(',').collect();
    let call_count: u64 = fields[2].parse().unwrap();
    let total_energy: f64 = fields[3].parse().unwrap();
    let total_elapsed: u64 = fields[4].parse().unwrap();
    assert_eq!(call_count, 5);

    let mut energy_sum = 0.0f64;
    let mut elapsed_sum = 0u64;
    for row in &calls[1..] {
        let f: Vec<&str> = row.split(',').collect();
        energy_sum += f[2].parse::<f64>().unwrap();
        elapsed_sum += f[3].parse::<u64>().unwrap();
    }
    assert!((total_energy - energy_sum).abs() < 1e-9);
    assert_eq!(total_elapsed, elapsed_sum);
}

#[test]
fn sequential_runs_append_without_duplicate_headers() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("results.csv");

    let mut first = NoopCallsExperiment::new(tmp.path(), output.clone(), 3);
    let summary = run_experiment(&mut first, 2, false).unwrap();
    let metrics_once = lines(&summary.tables.metrics).len();
    let calls_once = lines(&summary.tables.calls).len();

    let mut second = NoopCallsExperiment::new(tmp.path(), output, 3);
    let summary = run_experiment(&mut second, 2, false).unwrap();

    let metrics = lines(&summary.tables.metrics);
    let calls = lines(&summary.tables.calls);
    // Twice the data rows, still one header each.
    assert_eq!(metrics.len(), metrics_once * 2 - 1);
    assert_eq!(calls.len(), calls_once * 2 - 1);
    assert_eq!(
        metrics.iter().filter(|l| l.starts_with("trial_id")).count(),
        1
    );
}

#[test]
fn failed_trial_persists_nothing() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("results.csv");
    let mut exp = NoopCallsExperiment::new(tmp.path(), output.clone(), 3);
    exp.fail_on_trial = Some(2);

    let err = run_experiment(&mut exp, 3, false).unwrap_err();
    assert!(matches!(err, BenchError::Workload { .. }));

    // No table holds rows for the aborted run.
    assert!(!output.exists());
    assert!(!tmp.path().join("results_functions.csv").exists());
    assert!(!tmp.path().join("results_calls.csv").exists());
}

#[test]
fn zero_runs_touch_nothing() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("results.csv");
    let mut exp = NoopCallsExperiment::new(tmp.path(), output.clone(), 3);
    let summary = run_experiment(&mut exp, 0, false).unwrap();
    assert!(summary.trial_ids.is_empty());
    assert!(!output.exists());
}
