// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Task granularity sweep: the same compute budget split into one
//! sequential task, a few coarse chunks, or many fine chunks, dispatched
//! on a fixed thread pool. Every chunk goes through the profiler.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::thread;

use anyhow::Context;
use joulebench_core::{Experiment, ExperimentConfig, Probe};

use crate::kernels;
use crate::lock;

/// How the compute budget is partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GranularityMode {
    /// One task holding the whole budget.
    Sequential,
    /// One chunk per pool thread.
    Coarse,
    /// A thousand small chunks.
    Fine,
}

impl GranularityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GranularityMode::Sequential => "sequential",
            GranularityMode::Coarse => "coarse",
            GranularityMode::Fine => "fine",
        }
    }
}

impl fmt::Display for GranularityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-budget multiply-add kernel at varying task sizes.
pub struct TaskGranularityExperiment {
    mode: GranularityMode,
    total_items: u64,
    pool_threads: usize,
    config: ExperimentConfig,
}

impl TaskGranularityExperiment {
    pub fn new(mode: GranularityMode, config: ExperimentConfig) -> Self {
        Self {
            mode,
            total_items: 10_000_000,
            pool_threads: 4,
            config,
        }
    }

    /// Override the compute budget (tests use tiny ones).
    pub fn with_budget(mut self, total_items: u64) -> Self {
        self.total_items = total_items;
        self
    }

    fn task_sizes(&self) -> Vec<u64> {
        match self.mode {
            GranularityMode::Sequential => vec![self.total_items],
            GranularityMode::Coarse => {
                vec![self.total_items / self.pool_threads as u64; self.pool_threads]
            }
            GranularityMode::Fine => vec![self.total_items / 1000; 1000],
        }
    }
}

impl Experiment for TaskGranularityExperiment {
    fn name(&self) -> &str {
        "task_granularity"
    }

    fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    fn setup(&mut self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.config.work_dir)
            .context("creating granularity experiment work directory")?;
        Ok(())
    }

    fn run_workload(&mut self, probe: &Probe) -> anyhow::Result<()> {
        let pending: Mutex<VecDeque<u64>> = Mutex::new(self.task_sizes().into());
        thread::scope(|s| {
            for _ in 0..self.pool_threads {
                s.spawn(|| loop {
                    let Some(size) = lock(&pending).pop_front() else {
                        break;
                    };
                    probe
                        .profiler()
                        .measure("compute_chunk", || kernels::compute_chunk(size));
                });
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joulebench_core::run_trial;

    fn experiment(mode: GranularityMode, dir: &std::path::Path) -> TaskGranularityExperiment {
        let config = ExperimentConfig::new(dir, dir.join("gran.csv")).measure_total_run(false);
        TaskGranularityExperiment::new(mode, config).with_budget(4000)
    }

    #[test]
    fn test_task_sizes_per_mode() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert_eq!(
            experiment(GranularityMode::Sequential, tmp.path()).task_sizes(),
            vec![4000]
        );
        assert_eq!(
            experiment(GranularityMode::Coarse, tmp.path()).task_sizes(),
            vec![1000; 4]
        );
        assert_eq!(
            experiment(GranularityMode::Fine, tmp.path()).task_sizes(),
            vec![4; 1000]
        );
    }

    #[test]
    fn test_every_chunk_is_profiled() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut exp = experiment(GranularityMode::Coarse, tmp.path());
        let trial = run_trial(&mut exp).unwrap();
        assert_eq!(trial.records.len(), 4);
        assert!(trial.records.iter().all(|r| r.func_name == "compute_chunk"));
    }

    #[test]
    fn test_sequential_is_one_call() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut exp = experiment(GranularityMode::Sequential, tmp.path());
        let trial = run_trial(&mut exp).unwrap();
        assert_eq!(trial.records.len(), 1);
    }
}
