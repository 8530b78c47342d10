// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Worker-process entry for the CPU concurrency experiment.
//!
//! A worker receives its record directory and task split explicitly on the
//! command line (forwarded by the spawning workload), builds its own
//! file-backed record store and profiler, runs one kernel segment, and
//! exits. The parent process harvests the record files it left behind.

use std::path::PathBuf;
use std::sync::Arc;

use joulebench_core::{Profiler, RecordStore};

use crate::cpu::CpuKernel;
use crate::kernels;

/// Everything a worker needs; no inherited environment is consulted.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Record directory shared with the aggregating process.
    pub record_dir: PathBuf,
    pub task: WorkerTask,
}

/// One kernel segment.
#[derive(Debug, Clone)]
pub enum WorkerTask {
    Sieve { start: u64, end: u64 },
    Matmul { row_start: usize, row_end: usize, size: usize },
}

impl WorkerTask {
    /// Build the task from CLI-shaped arguments.
    pub fn from_args(kernel: CpuKernel, start: u64, end: u64, size: Option<usize>) -> Self {
        match kernel {
            CpuKernel::Sieve => WorkerTask::Sieve { start, end },
            CpuKernel::Matmul => WorkerTask::Matmul {
                row_start: start as usize,
                row_end: end as usize,
                size: size.unwrap_or(end as usize),
            },
        }
    }
}

/// Run one worker task, profiled into the configured record directory.
pub fn run_worker(config: WorkerConfig) -> anyhow::Result<()> {
    anyhow::ensure!(
        config.record_dir.is_dir(),
        "record directory {} does not exist",
        config.record_dir.display()
    );
    let store = Arc::new(RecordStore::with_record_dir(&config.record_dir));
    let profiler = Profiler::new(store);

    match config.task {
        WorkerTask::Sieve { start, end } => {
            profiler.measure("sieve_task", || kernels::sieve_segment(start, end));
        }
        WorkerTask::Matmul {
            row_start,
            row_end,
            size,
        } => {
            profiler.measure("matmul_task", || {
                kernels::matmul_rows(row_start, row_end, size)
            });
        }
    }
    Ok(())
}
