// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning work
//! itself. This makes it easy to swap in a fake executor in tests while
//! keeping the production path in [`PipelineBackend`].
//!
//! - `PipelineBackend` runs each task through the [`Pipeline`] on a blocking
//!   worker thread and reports `RuntimeEvent::TaskFinished` back.
//! - Tests can provide their own `ExecutorBackend` that, for example,
//!   records which tasks were dispatched and replies with canned outcomes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::{Result, TaskError};
use crate::exec::pipeline::Pipeline;
use crate::observer::ObserverList;
use crate::outcome::TaskExecution;

/// Trait abstracting how claimed tasks are executed.
pub trait ExecutorBackend: Send {
    /// Start executing the given tasks.
    ///
    /// Must not wait for the tasks to finish; completions are reported as
    /// [`RuntimeEvent::TaskFinished`] on the runtime's channel, exactly once
    /// per task.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend: one `spawn_blocking` worker per claimed task.
///
/// The runtime bounds how many tasks are claimed at once, so this backend
/// never queues.
pub struct PipelineBackend {
    pipeline: Arc<Pipeline>,
    observers: ObserverList,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl PipelineBackend {
    pub fn new(
        pipeline: Arc<Pipeline>,
        observers: ObserverList,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            pipeline,
            observers,
            runtime_tx,
        }
    }
}

impl ExecutorBackend for PipelineBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        for task in tasks {
            let pipeline = Arc::clone(&self.pipeline);
            let observers = self.observers.clone();
            let tx = self.runtime_tx.clone();

            tokio::spawn(async move {
                let id = task.id;
                let name = task.name.clone();

                let joined =
                    tokio::task::spawn_blocking(move || pipeline.run(&task, &observers)).await;

                let execution = match joined {
                    Ok(execution) => execution,
                    Err(join_err) => {
                        // Stages are individually guarded; only a panic in
                        // the pipeline driver itself lands here.
                        error!(task = %name, error = %join_err, "task worker died");
                        let mut execution = TaskExecution::pending();
                        execution.failed(TaskError::StagePanicked {
                            stage: "pipeline",
                            message: join_err.to_string(),
                        });
                        execution
                    }
                };

                if tx
                    .send(RuntimeEvent::TaskFinished { id, execution })
                    .await
                    .is_err()
                {
                    debug!(task = %name, "runtime gone; dropping task completion");
                }
            });
        }

        Box::pin(async { Ok(()) })
    }
}
