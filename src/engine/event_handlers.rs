// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use crate::dag::{ScheduledTask, Scheduler, TaskId, TaskName};
use crate::engine::RuntimeOptions;
use crate::errors::Result;
use crate::outcome::TaskExecution;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// These tasks were resolved `FailedDependency` without running; the
    /// shell notifies observers.
    ReportFailedDependencies(Vec<TaskName>),
    /// These finalizers were resolved `Skipped` without running.
    ReportSkipped(Vec<TaskName>),
    /// Every task is resolved and nothing is in flight.
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Seed the build: claim as many initially ready tasks as there are slots.
pub fn handle_start(scheduler: &mut Scheduler, options: &RuntimeOptions) -> Result<CoreStep> {
    let mut commands = Vec::new();
    let dispatch = fill_slots(scheduler, options)?;
    if !dispatch.is_empty() {
        commands.push(CoreCommand::DispatchTasks(dispatch));
    }
    finish_if_done(scheduler, commands)
}

/// Handle a task finishing its pass through the pipeline.
///
/// Records the outcome, resolves dependents, then refills free slots.
pub fn handle_task_finished(
    scheduler: &mut Scheduler,
    options: &RuntimeOptions,
    id: TaskId,
    execution: TaskExecution,
) -> Result<CoreStep> {
    let mut commands = Vec::new();

    let step = scheduler.complete(id, execution)?;
    if !step.newly_failed_dependency.is_empty() {
        commands.push(CoreCommand::ReportFailedDependencies(
            step.newly_failed_dependency,
        ));
    }
    if !step.newly_skipped.is_empty() {
        commands.push(CoreCommand::ReportSkipped(step.newly_skipped));
    }

    let dispatch = fill_slots(scheduler, options)?;
    if !dispatch.is_empty() {
        commands.push(CoreCommand::DispatchTasks(dispatch));
    }

    finish_if_done(scheduler, commands)
}

/// Claim ready tasks until `concurrency` tasks are in flight.
fn fill_slots(scheduler: &mut Scheduler, options: &RuntimeOptions) -> Result<Vec<ScheduledTask>> {
    let mut claimed = Vec::new();
    while scheduler.in_flight() < options.concurrency {
        match scheduler.claim_next()? {
            Some(task) => claimed.push(task),
            None => break,
        }
    }
    Ok(claimed)
}

fn finish_if_done(scheduler: &Scheduler, mut commands: Vec<CoreCommand>) -> Result<CoreStep> {
    if !scheduler.is_finished() {
        return Ok(CoreStep {
            commands,
            keep_running: true,
        });
    }

    scheduler.check_not_stalled()?;
    commands.push(CoreCommand::RequestExit);
    Ok(CoreStep {
        commands,
        keep_running: false,
    })
}
