// src/exec/pipeline.rs

//! The execution pipeline: an ordered chain of stages each task passes
//! through.
//!
//! A stage may decide the task's outcome and stop, or hand control to the
//! rest of the chain through [`Next`] and inspect the result afterwards.
//! Every stage runs under a panic guard, so a panic becomes a `Failed`
//! outcome for that task and never escapes into the scheduler.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, error};

use crate::dag::ScheduledTask;
use crate::dag::task::TaskNode;
use crate::errors::TaskError;
use crate::exec::stages::{ActionStage, GatingStage, OutputCaptureStage, UpToDateStage};
use crate::exec::up_to_date::UpToDateCheck;
use crate::observer::ObserverList;
use crate::outcome::TaskExecution;

/// One link of the pipeline.
pub trait Stage: Send + Sync {
    /// Stable name used in logs, observer hooks and panic reports.
    fn name(&self) -> &'static str;

    /// Run this stage. Call `next.run(..)` to continue down the chain;
    /// returning without calling it short-circuits the rest.
    fn execute(&self, task: &TaskNode, execution: &mut TaskExecution, next: Next<'_>);
}

/// Handle to the remainder of the chain.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    observers: &'a ObserverList,
}

impl<'a> Next<'a> {
    /// Run the remaining stages. A no-op at the end of the chain.
    pub fn run(self, task: &TaskNode, execution: &mut TaskExecution) {
        let Some((stage, rest)) = self.stages.split_first() else {
            return;
        };
        let next = Next {
            stages: rest,
            observers: self.observers,
        };
        run_guarded(stage.as_ref(), task, execution, next, self.observers);
    }
}

fn run_guarded(
    stage: &dyn Stage,
    task: &TaskNode,
    execution: &mut TaskExecution,
    next: Next<'_>,
    observers: &ObserverList,
) {
    let name = stage.name();
    observers.before_stage(&task.name, name);

    let result = catch_unwind(AssertUnwindSafe(|| stage.execute(task, execution, next)));
    if let Err(payload) = result {
        let message = panic_message(payload.as_ref());
        error!(task = %task.name, stage = name, %message, "stage panicked");
        execution.failed(TaskError::StagePanicked {
            stage: name,
            message,
        });
    }

    observers.after_stage(&task.name, name, execution);
}

/// Best-effort rendering of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// An ordered chain of stages.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("Pipeline").field("stages", &names).finish()
    }
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// gating → up-to-date → output capture → action.
    ///
    /// With `rerun_tasks` the up-to-date check is bypassed, but outputs are
    /// still recorded after a successful action.
    pub fn standard(check: Arc<dyn UpToDateCheck>, rerun_tasks: bool) -> Self {
        Self::new(vec![
            Arc::new(GatingStage),
            Arc::new(UpToDateStage::new(Arc::clone(&check)).enabled(!rerun_tasks)),
            Arc::new(OutputCaptureStage::new(check)),
            Arc::new(ActionStage),
        ])
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run one claimed task through every stage and return what they decided.
    ///
    /// Blocking; meant to be called from a worker thread.
    pub fn run(&self, task: &ScheduledTask, observers: &ObserverList) -> TaskExecution {
        let node = task.node.as_ref();
        observers.before_task(&task.name);

        let mut execution = TaskExecution::pending();
        Next {
            stages: &self.stages,
            observers,
        }
        .run(node, &mut execution);

        debug!(task = %task.name, outcome = %execution.outcome, "pipeline finished");
        observers.after_task(&task.name, execution.outcome, execution.error.as_deref());
        execution
    }
}
