//! Recording actions and observers for asserting on what the engine did.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use buildgraph::dag::ExecutionPlan;
use buildgraph::errors::TaskError;
use buildgraph::exec::{FnAction, TaskAction};
use buildgraph::observer::BuildObserver;
use buildgraph::outcome::{BuildResult, TaskExecution, TaskOutcome};

/// Shared record of which actions ran, in which order, and how many ran at
/// once. Clones share the same record.
#[derive(Clone, Default)]
pub struct ExecutionLog {
    started: Arc<Mutex<Vec<String>>>,
    finished: Arc<Mutex<Vec<String>>>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task names in the order their actions started.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    /// Task names in the order their actions returned.
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    pub fn ran(&self, task: &str) -> bool {
        self.started.lock().unwrap().iter().any(|t| t == task)
    }

    pub fn count(&self, task: &str) -> usize {
        self.started.lock().unwrap().iter().filter(|t| *t == task).count()
    }

    /// Highest number of actions observed running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    fn enter(&self, task: &str) {
        self.started.lock().unwrap().push(task.to_string());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self, task: &str) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().unwrap().push(task.to_string());
    }

    /// Action that records itself and succeeds.
    pub fn succeed(&self) -> Arc<dyn TaskAction> {
        self.sleep_then(Duration::ZERO, None)
    }

    /// Action that records itself and fails with `message`.
    pub fn fail(&self, message: &str) -> Arc<dyn TaskAction> {
        self.sleep_then(Duration::ZERO, Some(message.to_string()))
    }

    /// Action that records itself, sleeps for `delay`, then succeeds.
    pub fn sleep(&self, delay: Duration) -> Arc<dyn TaskAction> {
        self.sleep_then(delay, None)
    }

    /// Action that records itself, sleeps for `delay`, then fails.
    pub fn sleep_then_fail(&self, delay: Duration, message: &str) -> Arc<dyn TaskAction> {
        self.sleep_then(delay, Some(message.to_string()))
    }

    /// Action that records itself and panics.
    pub fn panic(&self, message: &str) -> Arc<dyn TaskAction> {
        let log = self.clone();
        let message = message.to_string();
        Arc::new(FnAction::new(move |task| {
            log.enter(&task.name);
            log.exit(&task.name);
            panic!("{}", message);
        }))
    }

    fn sleep_then(&self, delay: Duration, failure: Option<String>) -> Arc<dyn TaskAction> {
        let log = self.clone();
        Arc::new(FnAction::new(move |task| {
            log.enter(&task.name);
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            log.exit(&task.name);
            match &failure {
                Some(message) => Err(anyhow!("{}", message)),
                None => Ok(()),
            }
        }))
    }
}

/// Observer that records every hook invocation as a string:
///
/// - `before_graph`
/// - `before_task:<task>`
/// - `before_stage:<task>:<stage>`
/// - `after_stage:<task>:<stage>:<OUTCOME>`
/// - `after_task:<task>:<OUTCOME>`
/// - `after_graph:<verdict>`
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Events mentioning `task`, in order.
    pub fn task_events(&self, task: &str) -> Vec<String> {
        let needle = format!(":{task}");
        self.events()
            .into_iter()
            .filter(|e| e.contains(&format!("{needle}:")) || e.ends_with(&needle))
            .collect()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl BuildObserver for RecordingObserver {
    fn before_graph_execution(&self, _plan: &ExecutionPlan) -> Result<()> {
        self.push("before_graph".to_string());
        Ok(())
    }

    fn before_task(&self, task: &str) -> Result<()> {
        self.push(format!("before_task:{task}"));
        Ok(())
    }

    fn before_stage(&self, task: &str, stage: &'static str) -> Result<()> {
        self.push(format!("before_stage:{task}:{stage}"));
        Ok(())
    }

    fn after_stage(&self, task: &str, stage: &'static str, execution: &TaskExecution) -> Result<()> {
        self.push(format!("after_stage:{task}:{stage}:{}", execution.outcome));
        Ok(())
    }

    fn after_task(
        &self,
        task: &str,
        outcome: TaskOutcome,
        _error: Option<&TaskError>,
    ) -> Result<()> {
        self.push(format!("after_task:{task}:{outcome}"));
        Ok(())
    }

    fn after_graph_execution(&self, result: &BuildResult) -> Result<()> {
        self.push(format!("after_graph:{}", result.verdict));
        Ok(())
    }
}

/// Observer whose every hook returns an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingObserver;

impl BuildObserver for FailingObserver {
    fn before_task(&self, task: &str) -> Result<()> {
        Err(anyhow!("observer refused to watch '{task}'"))
    }

    fn after_task(
        &self,
        task: &str,
        _outcome: TaskOutcome,
        _error: Option<&TaskError>,
    ) -> Result<()> {
        Err(anyhow!("observer refused to watch '{task}'"))
    }

    fn after_graph_execution(&self, _result: &BuildResult) -> Result<()> {
        Err(anyhow!("observer refused to summarise"))
    }
}

/// Observer that panics in `after_stage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingObserver;

impl BuildObserver for PanickingObserver {
    fn after_stage(
        &self,
        task: &str,
        stage: &'static str,
        _execution: &TaskExecution,
    ) -> Result<()> {
        panic!("observer blew up on {task}/{stage}");
    }
}
