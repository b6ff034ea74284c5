// src/types.rs

use std::str::FromStr;
use serde::Deserialize;

/// What the scheduler does after a task fails.
///
/// - `FailFast`: stop claiming new tasks as soon as one task fails. Tasks
///   already executing finish naturally, finalizers of tasks that ran are
///   still dispatched, everything else stays `NotExecuted` (default).
/// - `KeepGoing`: keep dispatching every task that is not doomed by a failed
///   dependency, and report all failures at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    FailFast,
    KeepGoing,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::FailFast
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail-fast" | "failfast" => Ok(FailurePolicy::FailFast),
            "keep-going" | "keepgoing" | "continue" => Ok(FailurePolicy::KeepGoing),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"fail-fast\" or \"keep-going\")"
            )),
        }
    }
}

/// Mode for storing up-to-date fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashStorageMode {
    /// Store fingerprints in a file (`.buildgraph/hashes`).
    File,
    /// Store fingerprints in memory only (lost when the process exits).
    Memory,
}

impl Default for HashStorageMode {
    fn default() -> Self {
        HashStorageMode::Memory
    }
}
