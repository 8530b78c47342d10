// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Network client load generator: thread-per-worker vs async tasks
//! issuing requests against the delay server.
//!
//! The whole generation phase is one profiled call per trial (one record
//! for `run_threads` or `run_async`), matching the coarse granularity the
//! comparison needs. Individual request failures are ignored; the server
//! being down shows up as a fast, cheap trial rather than an error.

use std::fmt;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;

use anyhow::Context;
use joulebench_core::{Experiment, ExperimentConfig, Probe};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Concurrency model of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ClientMode {
    /// One OS thread per concurrent worker.
    Threads,
    /// Async tasks on one runtime.
    Async,
}

impl ClientMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientMode::Threads => "threads",
            ClientMode::Async => "async",
        }
    }
}

impl fmt::Display for ClientMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const REQUEST: &[u8] = b"GET / HTTP/1.0\r\n\r\n";

fn fetch_once(addr: &str) -> std::io::Result<usize> {
    let mut stream = TcpStream::connect(addr)?;
    stream.write_all(REQUEST)?;
    let mut response = Vec::new();
    stream.read_to_end(&mut response)?;
    Ok(response.len())
}

async fn fetch_once_async(addr: &str) -> std::io::Result<usize> {
    let mut stream = tokio::net::TcpStream::connect(addr).await?;
    stream.write_all(REQUEST).await?;
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(response.len())
}

/// Fixed request budget spread across concurrent workers.
pub struct NetworkLoadExperiment {
    total_requests: usize,
    concurrency: usize,
    mode: ClientMode,
    addr: String,
    config: ExperimentConfig,
}

impl NetworkLoadExperiment {
    pub fn new(
        mode: ClientMode,
        total_requests: usize,
        concurrency: usize,
        addr: impl Into<String>,
        config: ExperimentConfig,
    ) -> Self {
        Self {
            total_requests,
            concurrency: concurrency.max(1),
            mode,
            addr: addr.into(),
            config,
        }
    }

    fn run_threads(&self) {
        let per_worker = self.total_requests / self.concurrency;
        thread::scope(|s| {
            for _ in 0..self.concurrency {
                s.spawn(|| {
                    for _ in 0..per_worker {
                        let _ = fetch_once(&self.addr);
                    }
                });
            }
        });
    }

    async fn run_async(&self) {
        let per_worker = self.total_requests / self.concurrency;
        let mut workers = tokio::task::JoinSet::new();
        for _ in 0..self.concurrency {
            let addr = self.addr.clone();
            workers.spawn(async move {
                for _ in 0..per_worker {
                    let _ = fetch_once_async(&addr).await;
                }
            });
        }
        while workers.join_next().await.is_some() {}
    }
}

impl Experiment for NetworkLoadExperiment {
    fn name(&self) -> &str {
        "network_load"
    }

    fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    fn setup(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn run_workload(&mut self, probe: &Probe) -> anyhow::Result<()> {
        match self.mode {
            ClientMode::Threads => {
                probe.profiler().measure("run_threads", || self.run_threads());
            }
            ClientMode::Async => {
                let runtime = tokio::runtime::Runtime::new().context("building tokio runtime")?;
                runtime.block_on(async {
                    probe
                        .profiler()
                        .measure_async("run_async", self.run_async())
                        .await;
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server;
    use joulebench_core::run_trial;
    use std::time::Duration;

    fn spawn_server() -> (tokio::runtime::Runtime, String) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        runtime.spawn(server::serve_on(listener, Duration::from_millis(1), 64));
        (runtime, addr)
    }

    fn experiment(mode: ClientMode, addr: &str, dir: &std::path::Path) -> NetworkLoadExperiment {
        let config = ExperimentConfig::new(dir, dir.join("net.csv")).measure_total_run(false);
        NetworkLoadExperiment::new(mode, 4, 2, addr, config)
    }

    #[test]
    fn test_threads_mode_is_one_profiled_call() {
        let (runtime, addr) = spawn_server();
        let tmp = tempfile::TempDir::new().unwrap();
        let mut exp = experiment(ClientMode::Threads, &addr, tmp.path());
        let trial = run_trial(&mut exp).unwrap();
        assert_eq!(trial.records.len(), 1);
        assert_eq!(trial.records[0].func_name, "run_threads");
        runtime.shutdown_background();
    }

    #[test]
    fn test_async_mode_is_one_profiled_call() {
        let (runtime, addr) = spawn_server();
        let tmp = tempfile::TempDir::new().unwrap();
        let mut exp = experiment(ClientMode::Async, &addr, tmp.path());
        let trial = run_trial(&mut exp).unwrap();
        assert_eq!(trial.records.len(), 1);
        assert_eq!(trial.records[0].func_name, "run_async");
        runtime.shutdown_background();
    }

    #[test]
    fn test_fetch_roundtrip() {
        let (runtime, addr) = spawn_server();
        let len = fetch_once(&addr).unwrap();
        // Header plus the 64-byte body.
        assert!(len > 64);
        runtime.shutdown_background();
    }

    #[test]
    fn test_unreachable_server_does_not_fail_the_trial() {
        let tmp = tempfile::TempDir::new().unwrap();
        // Port 1 is essentially never listening.
        let mut exp = experiment(ClientMode::Threads, "127.0.0.1:1", tmp.path());
        let trial = run_trial(&mut exp).unwrap();
        assert_eq!(trial.records.len(), 1);
    }
}
