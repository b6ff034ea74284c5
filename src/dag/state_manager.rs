// src/dag/state_manager.rs

//! Per-build outcome slots and the transitions between them.

use tracing::{debug, warn};

use crate::dag::plan::{ExecutionPlan, PlannedTask, TaskId};
use crate::errors::{BuildError, Result};
use crate::outcome::{FailureRecord, FailureSet, TaskExecution, TaskOutcome, TaskReport};

/// Whether a task may be claimed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Every predecessor is terminal and every `depends_on` predecessor
    /// satisfied its dependents.
    Ready,
    /// At least one predecessor has not reached a terminal outcome.
    Waiting,
    /// A `depends_on` predecessor failed; the task can never run.
    Doomed(TaskId),
    /// A finalizer none of whose finalized tasks ran. It is resolved
    /// `Skipped` instead of being claimed.
    Unneeded,
}

/// Owns one outcome slot per planned task.
///
/// Every transition is checked: a task is claimed at most once, and a
/// terminal outcome is written at most once. Violations are engine bugs and
/// surface as [`BuildError::InternalState`].
#[derive(Debug)]
pub struct StateManager {
    reports: Vec<TaskReport>,
    /// Whether each task was ever handed to the pipeline.
    claimed: Vec<bool>,
    failures: FailureSet,
}

impl StateManager {
    pub fn new(plan: &ExecutionPlan) -> Self {
        Self {
            reports: (0..plan.len()).map(|_| TaskReport::not_executed()).collect(),
            claimed: vec![false; plan.len()],
            failures: FailureSet::new(),
        }
    }

    pub fn outcome(&self, id: TaskId) -> TaskOutcome {
        self.reports[id].outcome
    }

    /// `NotExecuted -> Executing`.
    pub fn claim(&mut self, task: &PlannedTask) -> Result<()> {
        let slot = &mut self.reports[task.id];
        if slot.outcome != TaskOutcome::NotExecuted {
            return Err(BuildError::InternalState(format!(
                "task '{}' dispatched twice (state {})",
                task.name(),
                slot.outcome
            )));
        }
        slot.outcome = TaskOutcome::Executing;
        self.claimed[task.id] = true;
        Ok(())
    }

    /// `Executing -> <terminal>` from a pipeline result.
    ///
    /// A `Failed` result is also appended to the failure set.
    pub fn complete(&mut self, task: &PlannedTask, execution: TaskExecution) -> Result<()> {
        let current = self.reports[task.id].outcome;
        if current != TaskOutcome::Executing {
            return Err(BuildError::InternalState(format!(
                "outcome for task '{}' reported while in state {current}",
                task.name()
            )));
        }
        if !execution.is_decided() {
            return Err(BuildError::InternalState(format!(
                "pipeline for task '{}' finished without deciding an outcome",
                task.name()
            )));
        }

        if execution.outcome == TaskOutcome::Failed {
            match execution.error.clone() {
                Some(error) => self.failures.push(FailureRecord {
                    task: task.name().to_string(),
                    error,
                }),
                None => {
                    return Err(BuildError::InternalState(format!(
                        "task '{}' failed without an attached error",
                        task.name()
                    )));
                }
            }
        }

        self.reports[task.id] = execution.into();
        Ok(())
    }

    /// `NotExecuted -> FailedDependency`, never entering the pipeline.
    pub fn fail_dependency(&mut self, task: &PlannedTask, dependency: &str) -> Result<()> {
        let current = self.reports[task.id].outcome;
        if current != TaskOutcome::NotExecuted {
            return Err(BuildError::InternalState(format!(
                "cannot mark task '{}' FAILED_DEPENDENCY from state {current}",
                task.name()
            )));
        }
        debug!(
            task = %task.name(),
            dependency = %dependency,
            "marking FAILED_DEPENDENCY due to upstream failure"
        );
        self.reports[task.id] = TaskReport::failed_dependency(dependency);
        Ok(())
    }

    /// `NotExecuted -> Skipped` for a finalizer with nothing to clean up
    /// after, never entering the pipeline.
    pub fn skip_unneeded(&mut self, task: &PlannedTask) -> Result<()> {
        let current = self.reports[task.id].outcome;
        if current != TaskOutcome::NotExecuted {
            return Err(BuildError::InternalState(format!(
                "cannot skip finalizer '{}' from state {current}",
                task.name()
            )));
        }
        debug!(task = %task.name(), "skipping finalizer: none of its tasks ran");
        self.reports[task.id] = TaskReport::unneeded_finalizer();
        Ok(())
    }

    /// Decide whether `task` can be claimed given its predecessors' outcomes.
    ///
    /// This is the canonical readiness rule:
    /// - `depends_on`: terminal and satisfying (`Success`, `Skipped`,
    ///   `UpToDate`); a failed one dooms the task
    /// - `must_run_after`: terminal, any outcome
    /// - finalized tasks (for finalizers): terminal, any outcome, and at
    ///   least one of them claimed unless the finalizer was requested itself
    pub fn readiness(&self, task: &PlannedTask) -> Readiness {
        let mut waiting = false;

        for dep in &task.depends_on {
            let outcome = self.outcome(*dep);
            if outcome.dooms_dependents() {
                return Readiness::Doomed(*dep);
            }
            if !outcome.satisfies_dependents() {
                waiting = true;
            }
        }

        let ordering_pending = task
            .must_run_after
            .iter()
            .chain(task.finalizes.iter())
            .any(|pred| !self.outcome(*pred).is_terminal());

        if waiting || ordering_pending {
            Readiness::Waiting
        } else if task.is_finalizer()
            && !task.requested
            && !task.finalizes.iter().any(|f| self.claimed[*f])
        {
            Readiness::Unneeded
        } else {
            Readiness::Ready
        }
    }

    /// Eagerly mark every transitive `depends_on` dependent of `failed` as
    /// `FailedDependency`.
    ///
    /// Returns the newly doomed tasks in the order they were marked.
    pub fn mark_dependents_failed(
        &mut self,
        plan: &ExecutionPlan,
        failed: TaskId,
    ) -> Result<Vec<TaskId>> {
        let mut newly_failed = Vec::new();
        let mut stack: Vec<(TaskId, TaskId)> = plan
            .task(failed)
            .dependents
            .iter()
            .rev()
            .map(|d| (*d, failed))
            .collect();

        while let Some((id, cause)) = stack.pop() {
            match self.outcome(id) {
                TaskOutcome::NotExecuted => {
                    let task = plan.task(id);
                    self.fail_dependency(task, plan.task(cause).name())?;
                    newly_failed.push(id);
                    stack.extend(task.dependents.iter().rev().map(|d| (*d, id)));
                }
                TaskOutcome::Executing => {
                    // A dependent can only be claimed once every dependency
                    // succeeded, so this means the readiness rule was broken.
                    return Err(BuildError::InternalState(format!(
                        "task '{}' is executing although dependency '{}' failed",
                        plan.task(id).name(),
                        plan.task(cause).name()
                    )));
                }
                other => {
                    if other != TaskOutcome::FailedDependency {
                        warn!(
                            task = %plan.task(id).name(),
                            outcome = %other,
                            "dependent already terminal while upstream failed"
                        );
                    }
                }
            }
        }

        Ok(newly_failed)
    }

    /// Whether every slot holds a terminal outcome.
    pub fn all_terminal(&self) -> bool {
        self.reports.iter().all(|r| r.outcome.is_terminal())
    }

    /// Consume the manager, yielding reports in plan order and the failure
    /// records in the order they were appended.
    pub fn into_parts(self) -> (Vec<TaskReport>, Vec<FailureRecord>) {
        let failures = self.failures.snapshot();
        (self.reports, failures)
    }
}
