// src/errors.rs

//! Crate-wide error types.
//!
//! Two families live here:
//! - [`BuildError`]: everything that stops a build invocation as a whole
//!   (bad configuration, unknown tasks, cycles, engine bugs).
//! - [`TaskError`]: the cause attached to a single task that ended `Failed`.
//!   These never propagate out of the pipeline; they are recorded as
//!   outcomes and surfaced in the final report.

use thiserror::Error;

use crate::dag::TaskName;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("No tasks requested and no default tasks configured")]
    NoTasksRequested,

    #[error("Cycle detected in task graph: {}", format_cycle(.members))]
    Cycle { members: Vec<TaskName> },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The engine broke one of its own contracts (double dispatch, a second
    /// terminal outcome, a stalled run). Never caused by task logic.
    #[error("Internal engine error: {0}")]
    InternalState(String),

    /// Ctrl-C arrived before the build finished.
    #[error("Build interrupted")]
    Interrupted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    /// Process exit status for this error.
    ///
    /// Build failures (some task failed) are reported through
    /// [`crate::outcome::BuildResult::exit_code`] instead; everything here
    /// happened before or around execution.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::Config(_)
            | BuildError::UnknownTask(_)
            | BuildError::NoTasksRequested
            | BuildError::Cycle { .. }
            | BuildError::Toml(_) => 2,
            BuildError::InternalState(_) => 3,
            BuildError::Interrupted => 130,
            BuildError::Io(_) | BuildError::Other(_) => 1,
        }
    }
}

fn format_cycle(members: &[TaskName]) -> String {
    match members.first() {
        Some(first) => {
            let mut path = members.join(" -> ");
            path.push_str(" -> ");
            path.push_str(first);
            path
        }
        None => "<empty>".to_string(),
    }
}

/// Why a single task ended `Failed`.
#[derive(Error, Debug)]
pub enum TaskError {
    /// A gating predicate could not be evaluated. Distinct from the predicate
    /// being false, which skips the task.
    #[error("could not evaluate onlyIf predicate '{predicate}'")]
    PredicateEvaluation {
        predicate: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not determine whether the task is up to date")]
    UpToDateCheck {
        #[source]
        source: anyhow::Error,
    },

    #[error("task action failed")]
    Action {
        #[source]
        source: anyhow::Error,
    },

    /// The action succeeded but its outputs could not be recorded.
    #[error("could not finalize task outputs")]
    Finalization {
        #[source]
        source: anyhow::Error,
    },

    #[error("stage '{stage}' panicked: {message}")]
    StagePanicked { stage: &'static str, message: String },
}

impl TaskError {
    /// Render the error together with its full `source()` chain on one line.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildError>;
