// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - handing `ScheduledTask`s to the executor backend
//! - notifying observers
//!
//! The core is the single owner of all outcome state, which is what makes
//! dispatch exactly-once. It can be unit tested without any Tokio, channels,
//! filesystem, or processes.

use std::sync::Arc;

use crate::dag::{ExecutionPlan, Scheduler};
use crate::engine::event_handlers::{CoreStep, handle_start, handle_task_finished};
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::errors::{BuildError, Result};
use crate::outcome::{BuildResult, TaskOutcome};

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(plan: Arc<ExecutionPlan>, options: RuntimeOptions) -> Result<Self> {
        if options.concurrency == 0 {
            return Err(BuildError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            scheduler: Scheduler::new(plan, options.failure_policy),
            options,
        })
    }

    pub fn plan(&self) -> &Arc<ExecutionPlan> {
        self.scheduler.plan()
    }

    pub fn options(&self) -> RuntimeOptions {
        self.options
    }

    /// Number of tasks currently handed to the executor.
    pub fn in_flight(&self) -> usize {
        self.scheduler.in_flight()
    }

    /// Provisional outcome of a task (for tests).
    pub fn outcome_of(&self, task: &str) -> Option<TaskOutcome> {
        self.scheduler.outcome_of(task)
    }

    /// Produce the initial dispatch.
    pub fn start(&mut self) -> Result<CoreStep> {
        handle_start(&mut self.scheduler, &self.options)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> Result<CoreStep> {
        match event {
            RuntimeEvent::TaskFinished { id, execution } => {
                handle_task_finished(&mut self.scheduler, &self.options, id, execution)
            }
        }
    }

    pub fn into_result(self) -> BuildResult {
        self.scheduler.into_result()
    }
}
