// src/exec/stages.rs

//! The built-in pipeline stages.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info};

use crate::dag::task::TaskNode;
use crate::errors::TaskError;
use crate::exec::pipeline::{Next, Stage, panic_message};
use crate::exec::up_to_date::UpToDateCheck;
use crate::outcome::{TaskExecution, TaskOutcome};

/// Evaluates the enabled flag and the "only if" predicates.
///
/// Predicates run in declaration order and evaluation stops at the first
/// one that is false (skip) or errors (fail). The action never runs in
/// either case.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatingStage;

impl Stage for GatingStage {
    fn name(&self) -> &'static str {
        "gating"
    }

    fn execute(&self, task: &TaskNode, execution: &mut TaskExecution, next: Next<'_>) {
        if !task.enabled {
            info!(task = %task.name, "skipping task as it is disabled");
            execution.skipped("task is disabled");
            return;
        }

        for predicate in &task.predicates {
            match predicate.evaluate(task) {
                Ok(true) => {}
                Ok(false) => {
                    info!(
                        task = %task.name,
                        predicate = %predicate.name(),
                        "skipping task as onlyIf is false"
                    );
                    execution.skipped(format!("'{}' not satisfied", predicate.name()));
                    return;
                }
                Err(source) => {
                    execution.failed(TaskError::PredicateEvaluation {
                        predicate: predicate.name().to_string(),
                        source,
                    });
                    return;
                }
            }
        }

        next.run(task, execution);
    }
}

/// Asks the up-to-date collaborator whether the action can be skipped.
pub struct UpToDateStage {
    check: Arc<dyn UpToDateCheck>,
    enabled: bool,
}

impl UpToDateStage {
    pub fn new(check: Arc<dyn UpToDateCheck>) -> Self {
        Self {
            check,
            enabled: true,
        }
    }

    /// When disabled the stage always continues down the chain.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Stage for UpToDateStage {
    fn name(&self) -> &'static str {
        "up-to-date"
    }

    fn execute(&self, task: &TaskNode, execution: &mut TaskExecution, next: Next<'_>) {
        if !self.enabled {
            debug!(task = %task.name, "up-to-date check bypassed");
            next.run(task, execution);
            return;
        }

        match self.check.is_up_to_date(task) {
            Ok(true) => {
                info!(task = %task.name, "task is UP-TO-DATE");
                execution.up_to_date();
            }
            Ok(false) => next.run(task, execution),
            Err(source) => execution.failed(TaskError::UpToDateCheck { source }),
        }
    }
}

/// Records the task's outputs once the rest of the chain succeeded.
///
/// A recording failure turns the success into a failure.
pub struct OutputCaptureStage {
    check: Arc<dyn UpToDateCheck>,
}

impl OutputCaptureStage {
    pub fn new(check: Arc<dyn UpToDateCheck>) -> Self {
        Self { check }
    }
}

impl Stage for OutputCaptureStage {
    fn name(&self) -> &'static str {
        "output-capture"
    }

    fn execute(&self, task: &TaskNode, execution: &mut TaskExecution, next: Next<'_>) {
        next.run(task, execution);

        if execution.outcome != TaskOutcome::Success {
            return;
        }
        if let Err(source) = self.check.record(task) {
            execution.failed(TaskError::Finalization { source });
        }
    }
}

/// Runs the task's action. Terminal: stages after it never run.
///
/// A task without an action succeeds. An action that returns an error or
/// panics fails the task with [`TaskError::Action`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionStage;

impl Stage for ActionStage {
    fn name(&self) -> &'static str {
        "action"
    }

    fn execute(&self, task: &TaskNode, execution: &mut TaskExecution, _next: Next<'_>) {
        let Some(action) = &task.action else {
            debug!(task = %task.name, "task has no action");
            execution.success();
            return;
        };

        match catch_unwind(AssertUnwindSafe(|| action.execute(task))) {
            Ok(Ok(())) => execution.success(),
            Ok(Err(source)) => execution.failed(TaskError::Action { source }),
            Err(payload) => execution.failed(TaskError::Action {
                source: anyhow!("action panicked: {}", panic_message(payload.as_ref())),
            }),
        }
    }
}
