//! Custom error types for joulebench.
//!
//! Explicit enum error types at the core layer. Workload code reports
//! failures as `anyhow::Error`; the core wraps them without inspecting them.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the measurement harness.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Filesystem preparation - fatal to a run
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Experiment failures - propagated uncaught, no retry at this layer
    // =========================================================================
    #[error("experiment setup failed: {source}")]
    Setup {
        #[source]
        source: anyhow::Error,
    },

    #[error("workload failed: {source}")]
    Workload {
        #[source]
        source: anyhow::Error,
    },

    // =========================================================================
    // Table persistence
    // =========================================================================
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Errors raised while appending the three result tables.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics schema mismatch for trial {trial}: expected columns [{expected}], got [{got}]")]
    SchemaMismatch {
        trial: String,
        expected: String,
        got: String,
    },

    #[error("existing metrics table {path} carries a different header: [{found}], expected [{expected}]")]
    HeaderMismatch {
        path: PathBuf,
        found: String,
        expected: String,
    },
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;
