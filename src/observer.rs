// src/observer.rs

//! Listener hooks around graph, task and stage execution.
//!
//! Observers are notified in registration order. A failing or panicking
//! observer is logged and ignored; it never changes a task's outcome.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::dag::ExecutionPlan;
use crate::errors::TaskError;
use crate::outcome::{BuildResult, TaskExecution, TaskOutcome};

/// Callbacks fired by the engine. Every hook defaults to a no-op.
///
/// Task and stage hooks run on worker threads, possibly concurrently for
/// different tasks.
pub trait BuildObserver: Send + Sync {
    fn before_graph_execution(&self, _plan: &ExecutionPlan) -> Result<()> {
        Ok(())
    }

    fn before_task(&self, _task: &str) -> Result<()> {
        Ok(())
    }

    fn before_stage(&self, _task: &str, _stage: &'static str) -> Result<()> {
        Ok(())
    }

    fn after_stage(
        &self,
        _task: &str,
        _stage: &'static str,
        _execution: &TaskExecution,
    ) -> Result<()> {
        Ok(())
    }

    /// Also fired for tasks resolved `FailedDependency`, which never enter
    /// the pipeline.
    fn after_task(
        &self,
        _task: &str,
        _outcome: TaskOutcome,
        _error: Option<&TaskError>,
    ) -> Result<()> {
        Ok(())
    }

    fn after_graph_execution(&self, _result: &BuildResult) -> Result<()> {
        Ok(())
    }
}

/// Ordered set of observers with isolated notification.
#[derive(Clone, Default)]
pub struct ObserverList {
    observers: Vec<Arc<dyn BuildObserver>>,
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.observers.len())
            .finish()
    }
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observer: Arc<dyn BuildObserver>) {
        self.observers.push(observer);
    }

    pub fn with(mut self, observer: impl BuildObserver + 'static) -> Self {
        self.push(Arc::new(observer));
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    fn notify<F>(&self, hook: &'static str, f: F)
    where
        F: Fn(&dyn BuildObserver) -> Result<()>,
    {
        for observer in &self.observers {
            match catch_unwind(AssertUnwindSafe(|| f(observer.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(hook, error = %err, "build observer failed; ignoring");
                }
                Err(_) => {
                    warn!(hook, "build observer panicked; ignoring");
                }
            }
        }
    }

    pub fn before_graph_execution(&self, plan: &ExecutionPlan) {
        self.notify("before_graph_execution", |o| o.before_graph_execution(plan));
    }

    pub fn before_task(&self, task: &str) {
        self.notify("before_task", |o| o.before_task(task));
    }

    pub fn before_stage(&self, task: &str, stage: &'static str) {
        self.notify("before_stage", |o| o.before_stage(task, stage));
    }

    pub fn after_stage(&self, task: &str, stage: &'static str, execution: &TaskExecution) {
        self.notify("after_stage", |o| o.after_stage(task, stage, execution));
    }

    pub fn after_task(&self, task: &str, outcome: TaskOutcome, error: Option<&TaskError>) {
        self.notify("after_task", |o| o.after_task(task, outcome, error));
    }

    pub fn after_graph_execution(&self, result: &BuildResult) {
        self.notify("after_graph_execution", |o| o.after_graph_execution(result));
    }
}

/// Logs task lifecycle events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl BuildObserver for LoggingObserver {
    fn before_graph_execution(&self, plan: &ExecutionPlan) -> Result<()> {
        info!(tasks = plan.len(), order = ?plan.order(), "executing task graph");
        Ok(())
    }

    fn before_task(&self, task: &str) -> Result<()> {
        info!(task = %task, "> Task :{}", task);
        Ok(())
    }

    fn after_stage(
        &self,
        task: &str,
        stage: &'static str,
        execution: &TaskExecution,
    ) -> Result<()> {
        debug!(task = %task, stage, outcome = %execution.outcome, "stage finished");
        Ok(())
    }

    fn after_task(
        &self,
        task: &str,
        outcome: TaskOutcome,
        error: Option<&TaskError>,
    ) -> Result<()> {
        match (outcome, error) {
            (TaskOutcome::Failed, Some(err)) => {
                warn!(task = %task, error = %err.chain(), "task FAILED");
            }
            (TaskOutcome::Failed | TaskOutcome::FailedDependency, None) => {
                warn!(task = %task, outcome = %outcome, "task did not succeed");
            }
            (TaskOutcome::Skipped, _) => info!(task = %task, "task SKIPPED"),
            _ => debug!(task = %task, outcome = %outcome, "task finished"),
        }
        Ok(())
    }

    fn after_graph_execution(&self, result: &BuildResult) -> Result<()> {
        info!(
            verdict = %result.verdict,
            tasks = result.counts.total(),
            failed = result.counts.failed,
            "task graph finished"
        );
        Ok(())
    }
}
