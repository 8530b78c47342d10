// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Disk write workload: a fixed byte budget written in chunks, either
//! buffered (one fsync at the end) or synced after every chunk. Each
//! chunk write is a profiled call.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use joulebench_core::{Experiment, ExperimentConfig, Probe};

/// Append-writes `total_size` bytes in `chunk_size` pieces.
pub struct DiskWriteExperiment {
    total_size: u64,
    chunk_size: usize,
    buffered: bool,
    config: ExperimentConfig,
}

impl DiskWriteExperiment {
    pub fn new(total_size: u64, chunk_size: usize, buffered: bool, config: ExperimentConfig) -> Self {
        Self {
            total_size,
            chunk_size: chunk_size.max(1),
            buffered,
            config,
        }
    }

    fn write_chunk(&self, path: &Path, data: &[u8]) -> anyhow::Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .context("opening data file for append")?;
        file.write_all(data).context("writing chunk")?;
        if !self.buffered {
            file.sync_all().context("syncing chunk")?;
        }
        Ok(())
    }
}

// xorshift64*; fresh bytes per chunk without a dependency on an RNG crate
fn fill_pseudo_random(buf: &mut [u8], state: &mut u64) {
    for chunk in buf.chunks_mut(8) {
        *state ^= *state << 13;
        *state ^= *state >> 7;
        *state ^= *state << 17;
        let bytes = state.wrapping_mul(0x2545F4914F6CDD1D).to_le_bytes();
        for (b, v) in chunk.iter_mut().zip(bytes) {
            *b = v;
        }
    }
}

impl Experiment for DiskWriteExperiment {
    fn name(&self) -> &str {
        "disk_write"
    }

    fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    fn setup(&mut self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.config.work_dir)
            .context("creating disk experiment work directory")?;
        Ok(())
    }

    fn run_workload(&mut self, probe: &Probe) -> anyhow::Result<()> {
        let path = self
            .config
            .work_dir
            .join(format!("test_{}.dat", self.chunk_size));
        File::create(&path).context("truncating data file")?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut rng_state: u64 = 0x9E3779B97F4A7C15;
        let mut written = 0u64;
        while written < self.total_size {
            let len = self.chunk_size.min((self.total_size - written) as usize);
            fill_pseudo_random(&mut buf[..len], &mut rng_state);
            probe
                .profiler()
                .measure("write_chunk", || self.write_chunk(&path, &buf[..len]))?;
            written += len as u64;
        }

        if self.buffered {
            File::options()
                .write(true)
                .open(&path)
                .context("reopening data file")?
                .sync_all()
                .context("final sync")?;
        }
        std::fs::remove_file(&path).context("removing data file")?;
        Ok(())
    }
}
