#![allow(dead_code)]

use std::sync::Arc;

use buildgraph::dag::{TaskSet, freeze};
use buildgraph::engine::{BuildExecutor, RuntimeOptions};
use buildgraph::errors::TaskError;
use buildgraph::outcome::{BuildResult, TaskExecution, TaskOutcome};
use buildgraph::types::FailurePolicy;
use buildgraph_test_utils::with_timeout;

pub fn options(concurrency: usize, failure_policy: FailurePolicy) -> RuntimeOptions {
    RuntimeOptions {
        concurrency,
        failure_policy,
    }
}

/// A finished pipeline result with the given terminal outcome.
pub fn execution(outcome: TaskOutcome) -> TaskExecution {
    let mut execution = TaskExecution::pending();
    match outcome {
        TaskOutcome::Success => execution.success(),
        TaskOutcome::UpToDate => execution.up_to_date(),
        TaskOutcome::Skipped => execution.skipped("test skip"),
        TaskOutcome::Failed => execution.failed(TaskError::Action {
            source: anyhow::anyhow!("boom"),
        }),
        other => panic!("not a pipeline outcome: {other}"),
    }
    execution
}

/// Freeze `requested` and run it through the production backend.
pub async fn build(tasks: &TaskSet, requested: &[&str], options: RuntimeOptions) -> BuildResult {
    build_with(tasks, requested, BuildExecutor::new(options)).await
}

pub async fn build_with(
    tasks: &TaskSet,
    requested: &[&str],
    executor: BuildExecutor,
) -> BuildResult {
    let plan = freeze(tasks, requested).expect("plan should freeze");
    with_timeout(executor.execute(Arc::new(plan)))
        .await
        .expect("build should run")
}
