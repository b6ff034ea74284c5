// src/engine/build.rs

//! One-call build execution over the production pipeline backend.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::dag::ExecutionPlan;
use crate::engine::{CoreRuntime, Runtime, RuntimeOptions};
use crate::errors::Result;
use crate::exec::up_to_date::NeverUpToDate;
use crate::exec::{Pipeline, PipelineBackend};
use crate::observer::{BuildObserver, ObserverList};
use crate::outcome::BuildResult;

/// Configures and runs a build of an [`ExecutionPlan`].
///
/// Defaults to the standard pipeline with no up-to-date checking and no
/// observers.
#[derive(Debug, Clone)]
pub struct BuildExecutor {
    options: RuntimeOptions,
    pipeline: Arc<Pipeline>,
    observers: ObserverList,
}

impl BuildExecutor {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            options,
            pipeline: Arc::new(Pipeline::standard(Arc::new(NeverUpToDate), false)),
            observers: ObserverList::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    pub fn with_observer(mut self, observer: impl BuildObserver + 'static) -> Self {
        self.observers = self.observers.with(observer);
        self
    }

    pub fn with_observers(mut self, observers: ObserverList) -> Self {
        self.observers = observers;
        self
    }

    /// Execute every task of `plan` and return the aggregate result.
    ///
    /// Task failures are reported in the result, not as `Err`; an `Err`
    /// means the build could not be run at all or the engine broke.
    pub async fn execute(self, plan: Arc<ExecutionPlan>) -> Result<BuildResult> {
        let core = CoreRuntime::new(plan, self.options)?;

        // Each in-flight task sends exactly one event, so this never blocks
        // a worker for long.
        let (tx, rx) = mpsc::channel(self.options.concurrency.max(1) * 2);
        let backend = PipelineBackend::new(self.pipeline, self.observers.clone(), tx);

        Runtime::new(core, rx, backend, self.observers).run().await
    }
}

/// Execute `plan` with the standard pipeline and the given options.
pub async fn execute(plan: Arc<ExecutionPlan>, options: RuntimeOptions) -> Result<BuildResult> {
    BuildExecutor::new(options).execute(plan).await
}
