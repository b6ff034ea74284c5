use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::sync::mpsc;
use buildgraph::dag::ScheduledTask;
use buildgraph::engine::RuntimeEvent;
use buildgraph::errors::{BuildError, Result, TaskError};
use buildgraph::exec::ExecutorBackend;
use buildgraph::outcome::{TaskExecution, TaskOutcome};

/// A fake executor that:
/// - records which tasks were dispatched, batch by batch
/// - immediately reports `TaskFinished` for each one, with a scripted
///   outcome (default `Success`), without running any pipeline.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    batches: Arc<Mutex<Vec<Vec<String>>>>,
    outcomes: HashMap<String, TaskOutcome>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            batches: Arc::new(Mutex::new(Vec::new())),
            outcomes: HashMap::new(),
        }
    }

    /// Report `outcome` for `task` instead of `Success`.
    pub fn with_outcome(mut self, task: &str, outcome: TaskOutcome) -> Self {
        self.outcomes.insert(task.to_string(), outcome);
        self
    }

    /// Handle to the per-dispatch batches, for asserting on concurrency.
    pub fn batches(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        Arc::clone(&self.batches)
    }
}

fn scripted(outcome: TaskOutcome) -> TaskExecution {
    let mut execution = TaskExecution::pending();
    match outcome {
        TaskOutcome::Failed => execution.failed(TaskError::Action {
            source: anyhow!("scripted failure"),
        }),
        TaskOutcome::Skipped => execution.skipped("scripted skip"),
        TaskOutcome::UpToDate => execution.up_to_date(),
        _ => execution.success(),
    }
    execution
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let batches = Arc::clone(&self.batches);
        let outcomes = self.outcomes.clone();

        Box::pin(async move {
            batches
                .lock()
                .unwrap()
                .push(tasks.iter().map(|t| t.name.clone()).collect());

            for t in tasks {
                executed.lock().unwrap().push(t.name.clone());
                let outcome = outcomes.get(&t.name).copied().unwrap_or(TaskOutcome::Success);

                tx.send(RuntimeEvent::TaskFinished {
                    id: t.id,
                    execution: scripted(outcome),
                })
                .await
                .map_err(|e| BuildError::Other(anyhow!("runtime channel closed: {e}")))?;
            }
            Ok(())
        })
    }
}
