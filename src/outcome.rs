// src/outcome.rs

//! Outcome and failure model.
//!
//! - [`TaskOutcome`] is the per-task state machine (`NotExecuted` →
//!   `Executing` → one terminal state).
//! - [`TaskExecution`] is what one pass through the pipeline produced.
//! - [`FailureSet`] accumulates one [`FailureRecord`] per failed task.
//! - [`BuildResult`] is the aggregate handed back at the end of a build.

use std::fmt;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::dag::TaskName;
use crate::errors::TaskError;

/// State of a single task within one build invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskOutcome {
    /// Initial state; also the final state of tasks a fail-fast abort never
    /// reached.
    NotExecuted,
    /// Claimed by the scheduler and handed to a worker.
    Executing,
    Success,
    Failed,
    /// A gating predicate was unsatisfied.
    Skipped,
    /// The up-to-date collaborator decided no work was needed.
    UpToDate,
    /// A required (`depends_on`) predecessor failed; the task never entered
    /// the pipeline.
    FailedDependency,
}

impl TaskOutcome {
    /// Whether this outcome is final for the current build.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskOutcome::NotExecuted | TaskOutcome::Executing)
    }

    /// Whether a `depends_on` dependent may proceed after this outcome.
    ///
    /// Skipped and up-to-date predecessors unblock dependents exactly like a
    /// successful one.
    pub fn satisfies_dependents(self) -> bool {
        matches!(
            self,
            TaskOutcome::Success | TaskOutcome::Skipped | TaskOutcome::UpToDate
        )
    }

    /// Whether this outcome dooms `depends_on` dependents.
    pub fn dooms_dependents(self) -> bool {
        matches!(self, TaskOutcome::Failed | TaskOutcome::FailedDependency)
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskOutcome::NotExecuted => "NOT_EXECUTED",
            TaskOutcome::Executing => "EXECUTING",
            TaskOutcome::Success => "SUCCESS",
            TaskOutcome::Failed => "FAILED",
            TaskOutcome::Skipped => "SKIPPED",
            TaskOutcome::UpToDate => "UP_TO_DATE",
            TaskOutcome::FailedDependency => "FAILED_DEPENDENCY",
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of running one task through the execution pipeline.
///
/// Stages mutate this as the chain unwinds; the runtime turns the final
/// value into the task's write-once outcome.
#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub outcome: TaskOutcome,
    /// Set when the outcome is `Skipped`.
    pub skip_reason: Option<String>,
    /// Set when the outcome is `Failed`.
    pub error: Option<Arc<TaskError>>,
}

impl TaskExecution {
    pub fn pending() -> Self {
        Self {
            outcome: TaskOutcome::Executing,
            skip_reason: None,
            error: None,
        }
    }

    pub fn success(&mut self) {
        self.outcome = TaskOutcome::Success;
    }

    pub fn up_to_date(&mut self) {
        self.outcome = TaskOutcome::UpToDate;
    }

    pub fn skipped(&mut self, reason: impl Into<String>) {
        self.outcome = TaskOutcome::Skipped;
        self.skip_reason = Some(reason.into());
    }

    pub fn failed(&mut self, error: TaskError) {
        self.outcome = TaskOutcome::Failed;
        self.error = Some(Arc::new(error));
    }

    /// Whether a stage has already decided the outcome.
    pub fn is_decided(&self) -> bool {
        self.outcome.is_terminal()
    }
}

/// Final per-task entry in a [`BuildResult`].
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub outcome: TaskOutcome,
    /// Unsatisfied predicate (or idle finalizer) for `Skipped`, failed
    /// predecessor for `FailedDependency`.
    pub reason: Option<String>,
    pub error: Option<Arc<TaskError>>,
}

impl TaskReport {
    pub fn not_executed() -> Self {
        Self {
            outcome: TaskOutcome::NotExecuted,
            reason: None,
            error: None,
        }
    }

    pub fn failed_dependency(dependency: &str) -> Self {
        Self {
            outcome: TaskOutcome::FailedDependency,
            reason: Some(format!("dependency '{dependency}' failed")),
            error: None,
        }
    }

    pub fn unneeded_finalizer() -> Self {
        Self {
            outcome: TaskOutcome::Skipped,
            reason: Some("none of the tasks it finalizes ran".to_string()),
            error: None,
        }
    }
}

impl From<TaskExecution> for TaskReport {
    fn from(exec: TaskExecution) -> Self {
        Self {
            outcome: exec.outcome,
            reason: exec.skip_reason,
            error: exec.error,
        }
    }
}

/// One failed task and what caused it.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub task: TaskName,
    pub error: Arc<TaskError>,
}

/// Append-only collection of failure records for one build.
///
/// Internally synchronized so workers may append concurrently; readers get a
/// snapshot in append order.
#[derive(Debug, Default)]
pub struct FailureSet {
    records: Mutex<Vec<FailureRecord>>,
}

impl FailureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: FailureRecord) {
        // A poisoned lock only means another appender panicked mid-push; the
        // Vec itself is still consistent.
        let mut guard = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.push(record);
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<FailureRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Number of tasks per outcome kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub up_to_date: usize,
    pub failed_dependency: usize,
    pub not_executed: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Success => self.success += 1,
            TaskOutcome::Failed => self.failed += 1,
            TaskOutcome::Skipped => self.skipped += 1,
            TaskOutcome::UpToDate => self.up_to_date += 1,
            TaskOutcome::FailedDependency => self.failed_dependency += 1,
            // Executing can only be observed if the build was torn down
            // mid-flight; count it with the tasks that never finished.
            TaskOutcome::NotExecuted | TaskOutcome::Executing => self.not_executed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.success
            + self.failed
            + self.skipped
            + self.up_to_date
            + self.failed_dependency
            + self.not_executed
    }
}

/// Overall verdict of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildVerdict {
    Succeeded,
    Failed,
}

impl fmt::Display for BuildVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildVerdict::Succeeded => f.write_str("BUILD SUCCESSFUL"),
            BuildVerdict::Failed => f.write_str("BUILD FAILED"),
        }
    }
}

/// Aggregate result of one build invocation.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub verdict: BuildVerdict,
    /// Every task of the plan, in plan order.
    pub tasks: IndexMap<TaskName, TaskReport>,
    /// Tasks in the order they were handed to workers.
    pub dispatch_order: Vec<TaskName>,
    /// Failure records in the order failures were observed.
    pub failures: Vec<FailureRecord>,
    pub counts: OutcomeCounts,
    /// Whether a fail-fast abort stopped dispatching.
    pub aborted: bool,
}

impl BuildResult {
    pub fn new(
        tasks: IndexMap<TaskName, TaskReport>,
        dispatch_order: Vec<TaskName>,
        failures: Vec<FailureRecord>,
        aborted: bool,
    ) -> Self {
        let mut counts = OutcomeCounts::default();
        for report in tasks.values() {
            counts.record(report.outcome);
        }

        let verdict = if failures.is_empty() {
            BuildVerdict::Succeeded
        } else {
            BuildVerdict::Failed
        };

        Self {
            verdict,
            tasks,
            dispatch_order,
            failures,
            counts,
            aborted,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.verdict == BuildVerdict::Succeeded
    }

    pub fn outcome_of(&self, task: &str) -> Option<TaskOutcome> {
        self.tasks.get(task).map(|r| r.outcome)
    }

    pub fn report_of(&self, task: &str) -> Option<&TaskReport> {
        self.tasks.get(task)
    }

    /// Process exit status: 0 when the build succeeded, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self.verdict {
            BuildVerdict::Succeeded => 0,
            BuildVerdict::Failed => 1,
        }
    }
}
