// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CPU-bound kernels fanned out over spawned worker processes.
//!
//! Each trial splits the kernel's input range into one segment per worker
//! and spawns one worker process per segment. Workers share no memory with
//! this process; their profilers write record files into the trial's
//! record directory, which the lifecycle harvests after the workload
//! completes.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use anyhow::Context;
use joulebench_core::{Experiment, ExperimentConfig, Probe};

/// Which kernel the workers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CpuKernel {
    /// Segmented sieve of Eratosthenes.
    Sieve,
    /// Dense double-precision matrix multiplication.
    Matmul,
}

impl CpuKernel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuKernel::Sieve => "sieve",
            CpuKernel::Matmul => "matmul",
        }
    }
}

impl fmt::Display for CpuKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split `[0, total)` into `parts` contiguous ranges; the last range
/// absorbs the remainder.
pub fn split_range(total: u64, parts: usize) -> Vec<(u64, u64)> {
    let parts = parts.max(1) as u64;
    let per = total / parts;
    (0..parts)
        .map(|i| {
            let start = i * per;
            let end = if i == parts - 1 { total } else { (i + 1) * per };
            (start, end)
        })
        .collect()
}

/// Energy/time vs. process concurrency for CPU-bound kernels.
pub struct CpuConcurrencyExperiment {
    kernel: CpuKernel,
    num_workers: usize,
    sieve_n: u64,
    matmul_n: usize,
    worker_program: Option<PathBuf>,
    worker_args: Vec<String>,
    config: ExperimentConfig,
}

impl CpuConcurrencyExperiment {
    pub fn new(kernel: CpuKernel, num_workers: usize, config: ExperimentConfig) -> Self {
        Self {
            kernel,
            num_workers: num_workers.max(1),
            sieve_n: 10_000_000,
            matmul_n: 4096,
            worker_program: None,
            worker_args: vec!["worker".to_string()],
            config,
        }
    }

    /// Override problem sizes (tests use tiny ones).
    pub fn with_scale(mut self, sieve_n: u64, matmul_n: usize) -> Self {
        self.sieve_n = sieve_n;
        self.matmul_n = matmul_n;
        self
    }

    /// Override the worker command. Defaults to re-executing the current
    /// binary with a `worker` subcommand.
    pub fn with_worker_command(mut self, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        self.worker_program = Some(program.into());
        self.worker_args = args;
        self
    }

    fn worker_command(&self) -> anyhow::Result<(PathBuf, Vec<String>)> {
        let program = match &self.worker_program {
            Some(program) => program.clone(),
            None => std::env::current_exe().context("resolving worker executable")?,
        };
        Ok((program, self.worker_args.clone()))
    }
}

impl Experiment for CpuConcurrencyExperiment {
    fn name(&self) -> &str {
        "cpu_concurrency"
    }

    fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    fn setup(&mut self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.config.work_dir)
            .context("creating cpu experiment work directory")?;
        Ok(())
    }

    fn run_workload(&mut self, probe: &Probe) -> anyhow::Result<()> {
        let (program, leading_args) = self.worker_command()?;
        let total = match self.kernel {
            CpuKernel::Sieve => self.sieve_n,
            CpuKernel::Matmul => self.matmul_n as u64,
        };
        let segments = split_range(total, self.num_workers);

        let mut children = Vec::with_capacity(segments.len());
        for (start, end) in segments {
            let mut command = Command::new(&program);
            command
                .args(&leading_args)
                .arg("--record-dir")
                .arg(probe.record_dir())
                .arg("--kernel")
                .arg(self.kernel.as_str())
                .arg("--start")
                .arg(start.to_string())
                .arg("--end")
                .arg(end.to_string());
            if self.kernel == CpuKernel::Matmul {
                command.arg("--size").arg(self.matmul_n.to_string());
            }
            let child = command
                .spawn()
                .with_context(|| format!("spawning worker {}", program.display()))?;
            children.push(child);
        }

        for mut child in children {
            let status = child.wait().context("waiting for worker")?;
            anyhow::ensure!(status.success(), "worker exited with {}", status);
        }
        Ok(())
    }
}
