// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dag::{ScheduledTask, TaskName};
use crate::errors::{BuildError, Result};
use crate::exec::ExecutorBackend;
use crate::observer::ObserverList;
use crate::outcome::{BuildResult, TaskOutcome};

use super::core::CoreRuntime;
use super::event_handlers::CoreStep;
use super::{CoreCommand, RuntimeEvent};

/// Drives the scheduler in response to `RuntimeEvent`s, and delegates
/// actual task execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from the
/// channel, dispatching tasks to the executor and notifying observers.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    observers: ObserverList,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        observers: ObserverList,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            observers,
        }
    }

    /// Main event loop.
    ///
    /// - Seeds the build with the initially ready tasks.
    /// - Consumes `RuntimeEvent`s from `event_rx` and feeds them into the
    ///   core runtime.
    /// - Executes commands returned by the core (spawn tasks, notify, exit).
    ///
    /// Returns once every task of the plan is resolved and nothing is in
    /// flight.
    pub async fn run(mut self) -> Result<BuildResult> {
        info!(tasks = self.core.plan().len(), "buildgraph runtime started");
        self.observers.before_graph_execution(self.core.plan());

        let step = self.core.start()?;
        let mut keep_running = self.execute_step(step).await?;

        while keep_running {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    return Err(BuildError::InternalState(format!(
                        "runtime event channel closed with {} task(s) in flight",
                        self.core.in_flight()
                    )));
                }
            };

            debug!(?event, "runtime received event");

            // Feed the event into the pure core and get commands back.
            let step = self.core.step(event)?;
            keep_running = self.execute_step(step).await?;
        }

        let result = self.core.into_result();
        self.observers.after_graph_execution(&result);
        info!(verdict = %result.verdict, "runtime exiting");
        Ok(result)
    }

    async fn execute_step(&mut self, step: CoreStep) -> Result<bool> {
        for command in step.commands {
            self.execute_command(command).await?;
        }
        if !step.keep_running {
            info!("core requested exit; stopping runtime");
        }
        Ok(step.keep_running)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => {
                self.spawn_ready(tasks).await?;
            }
            CoreCommand::ReportFailedDependencies(tasks) => {
                self.report_failed_dependencies(&tasks);
            }
            CoreCommand::ReportSkipped(tasks) => {
                for task in &tasks {
                    info!(task = %task, "finalizer skipped: none of its tasks ran");
                    self.observers.after_task(task, TaskOutcome::Skipped, None);
                }
            }
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    fn report_failed_dependencies(&self, tasks: &[TaskName]) {
        for task in tasks {
            info!(task = %task, "task not run: a dependency failed");
            self.observers
                .after_task(task, TaskOutcome::FailedDependency, None);
        }
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "spawning ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}
