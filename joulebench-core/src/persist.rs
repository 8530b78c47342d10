// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Append-only CSV persistence of trial results.
//!
//! Three tables share the `trial_id` column: one metrics row per trial,
//! one function-summary row per (trial, function), one call-detail row per
//! profiled call. Headers are written only when a destination does not yet
//! exist; the metrics column set is frozen by the first row ever written
//! and any later trial (or pre-existing file) with a different key set
//! fails loudly instead of misaligning columns.

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::PersistError;
use crate::experiment::TrialResult;
use crate::profile::FunctionProfileRecord;

const FUNCTIONS_HEADER: &str = "trial_id,func_name,call_count,total_energy_j,total_elapsed_ns";
const CALLS_HEADER: &str = "trial_id,func_name,energy_j,elapsed_ns";

/// The three table destinations derived from one output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePaths {
    pub metrics: PathBuf,
    pub functions: PathBuf,
    pub calls: PathBuf,
}

impl TablePaths {
    /// Derive the function and call table paths from the metrics path:
    /// `results.csv` -> `results_functions.csv`, `results_calls.csv`.
    pub fn derive(output: &Path) -> Self {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = output
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let sibling = |suffix: &str| output.with_file_name(format!("{}_{}{}", stem, suffix, ext));
        Self {
            metrics: output.to_path_buf(),
            functions: sibling("functions"),
            calls: sibling("calls"),
        }
    }
}

/// Per-function aggregate of one trial's records.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSummary {
    pub func_name: String,
    pub call_count: u64,
    pub total_energy_j: f64,
    pub total_elapsed_ns: u64,
}

/// Group records by function identity, in order of first appearance.
pub fn aggregate_records(records: &[FunctionProfileRecord]) -> Vec<FunctionSummary> {
    let mut summaries: Vec<FunctionSummary> = Vec::new();
    for record in records {
        match summaries
            .iter_mut()
            .find(|s| s.func_name == record.func_name)
        {
            Some(summary) => {
                summary.call_count += 1;
                summary.total_energy_j += record.energy_j;
                summary.total_elapsed_ns += record.elapsed_ns;
            }
            None => summaries.push(FunctionSummary {
                func_name: record.func_name.clone(),
                call_count: 1,
                total_energy_j: record.energy_j,
                total_elapsed_ns: record.elapsed_ns,
            }),
        }
    }
    summaries
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn io_err(context: &'static str) -> impl Fn(std::io::Error) -> PersistError {
    move |source| PersistError::Io { context, source }
}

fn existing_header(path: &Path) -> Result<Option<String>, PersistError> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path).map_err(io_err("opening existing table"))?;
    let mut header = String::new();
    BufReader::new(file)
        .read_line(&mut header)
        .map_err(io_err("reading existing table header"))?;
    Ok(Some(header.trim_end().to_string()))
}

struct TableWriter {
    writer: BufWriter<File>,
}

impl TableWriter {
    /// Open a table in append mode, writing `header` only when the file
    /// is new.
    fn open(path: &Path, header: &str) -> Result<Self, PersistError> {
        let exists = path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err("opening result table"))?;
        let mut writer = BufWriter::new(file);
        if !exists {
            writeln!(writer, "{}", header).map_err(io_err("writing table header"))?;
        }
        Ok(Self { writer })
    }

    fn write_row(&mut self, fields: &[Cow<'_, str>]) -> Result<(), PersistError> {
        writeln!(self.writer, "{}", fields.join(",")).map_err(io_err("writing table row"))
    }

    fn finish(mut self) -> Result<(), PersistError> {
        self.writer.flush().map_err(io_err("flushing result table"))
    }
}

/// Append one metrics row, one function-summary row per function and one
/// call-detail row per record for every trial.
///
/// The metrics column set is taken from the first trial, with `trial_id`
/// pinned first. All trials must share it exactly, and a pre-existing
/// metrics file must carry the identical header.
pub fn append_trials(output: &Path, trials: &[TrialResult]) -> Result<TablePaths, PersistError> {
    let paths = TablePaths::derive(output);
    let Some(first) = trials.first() else {
        return Ok(paths);
    };

    let metric_keys: Vec<String> = first.metrics.keys().map(str::to_string).collect();
    let metrics_header = {
        let mut columns = vec!["trial_id".to_string()];
        columns.extend(metric_keys.iter().cloned());
        columns.join(",")
    };

    // Fail fast on schema drift, before any row is appended.
    for trial in trials {
        let keys: Vec<&str> = trial.metrics.keys().collect();
        if keys != metric_keys.iter().map(String::as_str).collect::<Vec<_>>() {
            return Err(PersistError::SchemaMismatch {
                trial: trial.trial_id.to_string(),
                expected: metric_keys.join(", "),
                got: keys.join(", "),
            });
        }
    }
    if let Some(found) = existing_header(&paths.metrics)? {
        if found != metrics_header {
            return Err(PersistError::HeaderMismatch {
                path: paths.metrics.clone(),
                found,
                expected: metrics_header,
            });
        }
    }

    let mut metrics_table = TableWriter::open(&paths.metrics, &metrics_header)?;
    let mut functions_table = TableWriter::open(&paths.functions, FUNCTIONS_HEADER)?;
    let mut calls_table = TableWriter::open(&paths.calls, CALLS_HEADER)?;

    for trial in trials {
        let id = trial.trial_id.to_string();

        let mut row: Vec<Cow<'_, str>> = vec![Cow::Owned(id.clone())];
        for key in &metric_keys {
            // Schema was validated above; a missing key cannot happen.
            let value = trial.metrics.get(key).unwrap_or_default();
            row.push(Cow::Owned(value.to_string()));
        }
        metrics_table.write_row(&row)?;

        for summary in aggregate_records(&trial.records) {
            functions_table.write_row(&[
                Cow::Owned(id.clone()),
                csv_field(&summary.func_name),
                Cow::Owned(summary.call_count.to_string()),
                Cow::Owned(summary.total_energy_j.to_string()),
                Cow::Owned(summary.total_elapsed_ns.to_string()),
            ])?;
        }

        for record in &trial.records {
            calls_table.write_row(&[
                Cow::Owned(id.clone()),
                csv_field(&record.func_name),
                Cow::Owned(record.energy_j.to_string()),
                Cow::Owned(record.elapsed_ns.to_string()),
            ])?;
        }
    }

    metrics_table.finish()?;
    functions_table.finish()?;
    calls_table.finish()?;
    Ok(paths)
}
