// src/engine/mod.rs

//! Orchestration engine for buildgraph.
//!
//! This module ties together:
//! - the DAG scheduler
//! - the bounded dispatch of claimed tasks to an executor backend
//! - the main runtime event loop that reacts to task completions
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. [`build`] wires both to the production
//! pipeline backend.

use crate::dag::TaskId;
use crate::outcome::TaskExecution;
use crate::types::FailurePolicy;

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Maximum number of tasks executing at once. Must be at least 1.
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

/// Events flowing into the runtime from workers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A claimed task went through the pipeline.
    TaskFinished { id: TaskId, execution: TaskExecution },
}

pub mod build;
pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use build::{BuildExecutor, execute};
pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
