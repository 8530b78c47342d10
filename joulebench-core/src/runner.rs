// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Trial orchestration.
//!
//! Runs an experiment's setup once, executes N trials, then appends every
//! trial to the three result tables in one pass. A trial failure aborts
//! the run before anything is persisted, so the tables never hold a
//! partial run.

use std::fs;

use crate::error::{BenchError, BenchResult};
use crate::experiment::{run_trial, Experiment, TrialResult};
use crate::persist::{self, aggregate_records, TablePaths};
use crate::types::TrialId;

/// What an orchestrator run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Correlation ids of the persisted trials, in execution order.
    pub trial_ids: Vec<TrialId>,
    /// Where the three tables were appended.
    pub tables: TablePaths,
}

fn print_trial(index: u32, runs: u32, trial: &TrialResult) {
    let metrics = trial
        .metrics
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ");
    println!("trial {}/{} [{}]: {}", index + 1, runs, trial.trial_id, metrics);
}

fn print_function_summaries(trial: &TrialResult) {
    let summaries = aggregate_records(&trial.records);
    if summaries.is_empty() {
        return;
    }
    println!("trial {} function summary:", trial.trial_id);
    for s in summaries {
        println!(
            "  {}: calls={} energy_j={} elapsed_ns={}",
            s.func_name, s.call_count, s.total_energy_j, s.total_elapsed_ns
        );
    }
}

/// Run `setup()` once, then `runs` trials, and append the results.
///
/// With `verbose`, a per-trial metric line and per-function aggregate are
/// printed as the run progresses.
pub fn run_experiment<E: Experiment + ?Sized>(
    exp: &mut E,
    runs: u32,
    verbose: bool,
) -> BenchResult<RunSummary> {
    exp.setup()
        .map_err(|source| BenchError::Setup { source })?;

    let output = exp.config().output.clone();
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| BenchError::Io {
                context: "creating output directory",
                source,
            })?;
        }
    }

    let mut trials = Vec::with_capacity(runs as usize);
    for i in 0..runs {
        let trial = run_trial(exp)?;
        if verbose {
            print_trial(i, runs, &trial);
        }
        trials.push(trial);
    }

    if trials.is_empty() {
        tracing::warn!(experiment = exp.name(), "no trials were run");
        return Ok(RunSummary {
            trial_ids: Vec::new(),
            tables: TablePaths::derive(&output),
        });
    }

    let tables = persist::append_trials(&output, &trials)?;

    if verbose {
        for trial in &trials {
            print_function_summaries(trial);
        }
    }
    tracing::info!(
        metrics = %tables.metrics.display(),
        functions = %tables.functions.display(),
        calls = %tables.calls.display(),
        "results written"
    );

    Ok(RunSummary {
        trial_ids: trials.iter().map(|t| t.trial_id).collect(),
        tables,
    })
}
