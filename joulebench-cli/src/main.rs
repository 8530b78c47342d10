// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Joulebench CLI
//!
//! One subcommand per workload, a sensor probe, the synthetic delay
//! server, and the hidden worker entry used by spawned worker processes.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use joulebench_core::runner::RunSummary;
use joulebench_core::sensors::{battery, hwmon, nvme, rapl};
use joulebench_core::{run_experiment, Experiment, ExperimentConfig};
use joulebench_workloads::{
    server, ClientMode, CpuConcurrencyExperiment, CpuKernel, DiskWriteExperiment, GranularityMode,
    NetworkLoadExperiment, TaskGranularityExperiment, WaitMode, WaitPatternExperiment,
    WorkerConfig, WorkerTask,
};

mod host;

use host::HostInfo;

/// Joulebench - energy and performance measurement harness
#[derive(Parser)]
#[command(name = "joulebench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging and per-trial output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every experiment subcommand.
#[derive(Args)]
struct RunArgs {
    /// Number of trials
    #[arg(short, long, default_value_t = 3)]
    runs: u32,

    /// Metrics table destination (defaults to a per-mode file name)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Scratch directory (defaults to a per-mode path under /tmp)
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Skip the whole-workload energy capture
    #[arg(long)]
    no_total_energy: bool,
}

impl RunArgs {
    fn config(&self, default_work_dir: &str, default_output: String) -> ExperimentConfig {
        let work_dir = self
            .work_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_work_dir));
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_output));
        ExperimentConfig::new(work_dir, output).measure_total_run(!self.no_total_energy)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compare busy-spin, blocking and async waits in a producer/consumer
    Wait {
        #[arg(long, value_enum)]
        mode: WaitMode,

        #[command(flatten)]
        run: RunArgs,
    },

    /// CPU-bound kernels fanned out over spawned worker processes
    Cpu {
        #[arg(long, value_enum)]
        kernel: CpuKernel,

        /// Worker process count
        #[arg(long, default_value_t = 5)]
        workers: usize,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Chunked disk writes, buffered or fsync-per-chunk
    Disk {
        /// Chunk size in KiB
        #[arg(long, default_value_t = 64)]
        chunk_kb: usize,

        /// Total bytes to write, in MiB
        #[arg(long, default_value_t = 100)]
        total_mb: u64,

        /// fsync after every chunk instead of once at the end
        #[arg(long)]
        unbuffered: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Task granularity sweep on a fixed thread pool
    Gran {
        #[arg(long, value_enum)]
        mode: GranularityMode,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Network client load against the delay server
    Net {
        #[arg(long, value_enum)]
        mode: ClientMode,

        #[arg(long, default_value_t = 100_000)]
        requests: usize,

        #[arg(long, default_value_t = 100)]
        concurrency: usize,

        /// Delay server address
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Run the synthetic delay server (50 ms, 1 KiB responses)
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },

    /// Probe available sensors
    Sensors,

    /// Worker-process entry, spawned by the cpu experiment
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        record_dir: PathBuf,

        #[arg(long, value_enum)]
        kernel: CpuKernel,

        #[arg(long)]
        start: u64,

        #[arg(long)]
        end: u64,

        #[arg(long)]
        size: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match cli.command {
        Commands::Wait { mode, run } => {
            let config = run.config("/tmp/wait_exp", format!("results_{}.csv", mode));
            let mut exp = WaitPatternExperiment::new(mode, config);
            execute(&mut exp, &run, cli.verbose)
        }
        Commands::Cpu {
            kernel,
            workers,
            run,
        } => {
            let config = run.config(
                &format!("/tmp/cpu_{}_{}", kernel, workers),
                format!("cpu_{}_{}.csv", kernel, workers),
            );
            let mut exp = CpuConcurrencyExperiment::new(kernel, workers, config);
            execute(&mut exp, &run, cli.verbose)
        }
        Commands::Disk {
            chunk_kb,
            total_mb,
            unbuffered,
            run,
        } => {
            let label = if unbuffered { "unbuffered" } else { "buffered" };
            let config = run.config("/tmp", format!("results_{}_{}kb.csv", label, chunk_kb));
            let mut exp = DiskWriteExperiment::new(
                total_mb * 1024 * 1024,
                chunk_kb * 1024,
                !unbuffered,
                config,
            );
            execute(&mut exp, &run, cli.verbose)
        }
        Commands::Gran { mode, run } => {
            let config = run.config(
                &format!("/tmp/granularity_{}", mode),
                format!("granularity_{}.csv", mode),
            );
            let mut exp = TaskGranularityExperiment::new(mode, config);
            execute(&mut exp, &run, cli.verbose)
        }
        Commands::Net {
            mode,
            requests,
            concurrency,
            addr,
            run,
        } => {
            let config = run.config(
                "/tmp/io_experiment",
                format!("io_{}_{}c.csv", mode, concurrency),
            );
            let mut exp = NetworkLoadExperiment::new(mode, requests, concurrency, addr, config);
            execute(&mut exp, &run, cli.verbose)
        }
        Commands::Serve { port } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(&format!("127.0.0.1:{}", port)))
        }
        Commands::Sensors => {
            probe_sensors();
            Ok(())
        }
        Commands::Worker {
            record_dir,
            kernel,
            start,
            end,
            size,
        } => joulebench_workloads::run_worker(WorkerConfig {
            record_dir,
            task: WorkerTask::from_args(kernel, start, end, size),
        }),
    }
}

fn execute<E: Experiment>(exp: &mut E, run: &RunArgs, verbose: bool) -> anyhow::Result<()> {
    println!("joulebench {}", env!("CARGO_PKG_VERSION"));
    println!("started:    {}", Utc::now().to_rfc3339());
    println!("host:       {}", HostInfo::collect());
    println!("experiment: {} ({} trials)", exp.name(), run.runs);
    println!();

    let summary = run_experiment(exp, run.runs, verbose)?;
    report(&summary);
    Ok(())
}

fn report(summary: &RunSummary) {
    println!();
    println!(
        "Results written to {}, {} and {}",
        summary.tables.metrics.display(),
        summary.tables.functions.display(),
        summary.tables.calls.display()
    );
}

fn probe_sensors() {
    match battery::read_battery_charge() {
        Some(charge) => println!("battery: {} uAh", charge),
        None => println!("battery: unavailable"),
    }

    let zones = rapl::discover_zones();
    println!("powercap zones: {}", zones.len());
    for zone in &zones {
        println!("  {}", zone.name);
    }

    let channels = hwmon::discover_sensors();
    let readings = hwmon::read_sensors(&channels);
    println!("hwmon channels: {}", channels.len());
    for (key, value) in &readings {
        println!("  {} = {}", key, value);
    }

    let sensor = nvme::NvmeSensor::detect();
    println!("nvme namespaces: {}", sensor.devices().len());
    for (key, value) in sensor.read_counters() {
        println!("  {} = {}", key, value);
    }
}
