// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Joulebench Workloads
//!
//! Concrete experiments measured through the joulebench harness:
//!
//! - **Wait patterns**: busy-spin vs condvar-blocking vs async waits in a
//!   producer/consumer pipeline
//! - **CPU concurrency**: segmented sieve and dense matmul fanned out over
//!   spawned worker processes
//! - **Disk writes**: buffered vs per-chunk-fsync writes at varying chunk
//!   sizes
//! - **Task granularity**: one kernel split sequentially, coarsely or
//!   finely across a fixed thread pool
//! - **Network load**: thread-per-worker vs async clients against the
//!   synthetic delay server
//!
//! Each experiment implements [`joulebench_core::Experiment`] and calls the
//! trial probe around the code it wants measured.

pub mod cpu;
pub mod disk;
pub mod granularity;
pub mod kernels;
pub mod netload;
pub mod server;
pub mod wait;
pub mod worker;

pub use cpu::{CpuConcurrencyExperiment, CpuKernel};
pub use disk::DiskWriteExperiment;
pub use granularity::{GranularityMode, TaskGranularityExperiment};
pub use netload::{ClientMode, NetworkLoadExperiment};
pub use wait::{WaitMode, WaitPatternExperiment};
pub use worker::{run_worker, WorkerConfig, WorkerTask};

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
