// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers shared across the harness.

use std::fmt;

use uuid::Uuid;

/// Correlation id linking one trial's rows across all persisted tables.
///
/// Generated fresh per trial; unique for the lifetime of an orchestrator
/// run (and, being a v4 UUID, across runs appending to the same files).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrialId(Uuid);

impl TrialId {
    /// Generate a fresh trial id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TrialId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
