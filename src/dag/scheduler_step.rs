// src/dag/scheduler_step.rs

//! Values exchanged between the scheduler and the runtime.

use std::sync::Arc;

use crate::dag::plan::TaskId;
use crate::dag::task::TaskNode;
use crate::dag::TaskName;

/// A task the scheduler has claimed and wants a worker to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub name: TaskName,
    pub node: Arc<TaskNode>,
}

/// Structured result of reporting one completion to the scheduler.
///
/// Useful for tests that step the scheduler manually and make assertions
/// about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became claimable as a result of this step.
    pub newly_ready: Vec<TaskName>,
    /// Tasks resolved to `FailedDependency` in this step.
    pub newly_failed_dependency: Vec<TaskName>,
    /// Finalizers resolved to `Skipped` because nothing they finalize ran.
    pub newly_skipped: Vec<TaskName>,
    /// Whether this step triggered a fail-fast abort.
    pub aborted: bool,
}
