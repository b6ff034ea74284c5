// src/dag/scheduler.rs

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::dag::TaskName;
use crate::dag::plan::{ExecutionPlan, TaskId};
use crate::dag::scheduler_step::{ScheduledTask, SchedulerStep};
use crate::dag::state_manager::{Readiness, StateManager};
use crate::errors::{BuildError, Result};
use crate::outcome::{BuildResult, TaskExecution, TaskOutcome};
use crate::types::FailurePolicy;

/// Scheduler holds the frozen plan plus mutable per-build state.
///
/// It is responsible for:
/// - tracking which tasks are ready (all predecessors terminal)
/// - claiming ready tasks exactly once, lowest plan position first
/// - recording completions and resolving dependents eagerly
/// - applying the failure policy
///
/// It is purely synchronous and performs no IO; the runtime decides how many
/// claimed tasks run at once.
#[derive(Debug)]
pub struct Scheduler {
    plan: Arc<ExecutionPlan>,
    state: StateManager,
    policy: FailurePolicy,
    /// Claimable tasks, ordered by plan position.
    ready: BTreeSet<TaskId>,
    in_flight: usize,
    aborted: bool,
    dispatch_order: Vec<TaskId>,
}

impl Scheduler {
    pub fn new(plan: Arc<ExecutionPlan>, policy: FailurePolicy) -> Self {
        let state = StateManager::new(&plan);

        let ready: BTreeSet<TaskId> = plan
            .tasks()
            .filter(|t| state.readiness(t) == Readiness::Ready)
            .map(|t| t.id)
            .collect();

        debug!(
            tasks = plan.len(),
            initially_ready = ready.len(),
            ?policy,
            "scheduler: starting build"
        );

        Self {
            plan,
            state,
            policy,
            ready,
            in_flight: 0,
            aborted: false,
            dispatch_order: Vec::new(),
        }
    }

    pub fn plan(&self) -> &Arc<ExecutionPlan> {
        &self.plan
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Whether a fail-fast abort stopped regular dispatching.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Number of claimed tasks whose completion has not been reported yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Current outcome of a task; `None` for tasks outside the plan.
    ///
    /// `NotExecuted` and `Executing` are provisional while the build runs.
    pub fn outcome_of(&self, task: &str) -> Option<TaskOutcome> {
        self.plan.id_of(task).map(|id| self.state.outcome(id))
    }

    /// Names of tasks currently claimable, in the order they would be claimed.
    pub fn ready_tasks(&self) -> Vec<TaskName> {
        self.ready
            .iter()
            .filter(|id| self.claimable(**id))
            .map(|id| self.plan.task(*id).name().to_string())
            .collect()
    }

    /// Provisional view of every task's outcome, in plan order.
    pub fn snapshot(&self) -> Vec<(TaskName, TaskOutcome)> {
        self.plan
            .tasks()
            .map(|t| (t.name().to_string(), self.state.outcome(t.id)))
            .collect()
    }

    fn claimable(&self, id: TaskId) -> bool {
        // After a fail-fast abort only finalizers (cleanup) are dispatched.
        !self.aborted || self.plan.task(id).is_finalizer()
    }

    /// Claim the next ready task, marking it `Executing`.
    ///
    /// Returns `Ok(None)` when nothing is claimable right now. Each task is
    /// handed out at most once per build.
    pub fn claim_next(&mut self) -> Result<Option<ScheduledTask>> {
        let next = self.ready.iter().copied().find(|id| self.claimable(*id));
        let Some(id) = next else {
            return Ok(None);
        };

        self.ready.remove(&id);
        let task = self.plan.task(id);
        self.state.claim(task)?;
        self.in_flight += 1;
        self.dispatch_order.push(id);

        info!(
            task = %task.name(),
            position = id,
            in_flight = self.in_flight,
            "dependencies satisfied; dispatching task"
        );

        Ok(Some(ScheduledTask {
            id,
            name: task.name().to_string(),
            node: Arc::clone(&task.node),
        }))
    }

    /// Record the pipeline result for a claimed task and resolve whatever
    /// that unblocks or dooms.
    pub fn complete(&mut self, id: TaskId, execution: TaskExecution) -> Result<SchedulerStep> {
        if id >= self.plan.len() {
            return Err(BuildError::InternalState(format!(
                "completion reported for unknown task id {id}"
            )));
        }
        if self.in_flight == 0 {
            return Err(BuildError::InternalState(format!(
                "completion for task '{}' reported with nothing in flight",
                self.plan.task(id).name()
            )));
        }

        let plan = Arc::clone(&self.plan);
        let task = plan.task(id);
        let outcome = execution.outcome;

        self.state.complete(task, execution)?;
        self.in_flight -= 1;

        let mut step = SchedulerStep::default();
        let mut worklist: VecDeque<TaskId> = VecDeque::from([id]);

        match outcome {
            TaskOutcome::Failed => {
                warn!(task = %task.name(), "task failed; failing dependents in this build");
                if self.policy == FailurePolicy::FailFast && !self.aborted {
                    warn!(
                        task = %task.name(),
                        in_flight = self.in_flight,
                        "fail-fast: no further tasks will be dispatched"
                    );
                    self.aborted = true;
                    step.aborted = true;
                }
                let doomed = self.state.mark_dependents_failed(&plan, id)?;
                step.newly_failed_dependency
                    .extend(doomed.iter().map(|d| plan.task(*d).name().to_string()));
                worklist.extend(doomed);
            }
            other => {
                debug!(task = %task.name(), outcome = %other, "task completed");
            }
        }

        while let Some(changed) = worklist.pop_front() {
            for succ in &plan.task(changed).successors {
                let succ = *succ;
                if self.state.outcome(succ) != TaskOutcome::NotExecuted
                    || self.ready.contains(&succ)
                {
                    continue;
                }

                match self.state.readiness(plan.task(succ)) {
                    Readiness::Ready => {
                        self.ready.insert(succ);
                        step.newly_ready.push(plan.task(succ).name().to_string());
                    }
                    Readiness::Doomed(dep) => {
                        // Normally already resolved by the eager pass above.
                        self.state
                            .fail_dependency(plan.task(succ), plan.task(dep).name())?;
                        step.newly_failed_dependency
                            .push(plan.task(succ).name().to_string());
                        let more = self.state.mark_dependents_failed(&plan, succ)?;
                        step.newly_failed_dependency
                            .extend(more.iter().map(|d| plan.task(*d).name().to_string()));
                        worklist.push_back(succ);
                        worklist.extend(more);
                    }
                    Readiness::Unneeded => {
                        self.state.skip_unneeded(plan.task(succ))?;
                        step.newly_skipped.push(plan.task(succ).name().to_string());
                        worklist.push_back(succ);
                    }
                    Readiness::Waiting => {}
                }
            }
        }

        Ok(step)
    }

    /// Whether nothing is in flight and nothing more can be claimed.
    pub fn is_finished(&self) -> bool {
        self.in_flight == 0 && !self.ready.iter().any(|id| self.claimable(*id))
    }

    /// Detect a run that can make no progress although tasks remain.
    ///
    /// Only meaningful once [`Scheduler::is_finished`] returns `true`. After a
    /// fail-fast abort unfinished tasks are expected.
    pub fn check_not_stalled(&self) -> Result<()> {
        if self.aborted || self.state.all_terminal() {
            return Ok(());
        }

        let stuck: Vec<&str> = self
            .plan
            .tasks()
            .filter(|t| !self.state.outcome(t.id).is_terminal())
            .map(|t| t.name())
            .collect();

        Err(BuildError::InternalState(format!(
            "scheduler stalled with unfinished tasks: {}",
            stuck.join(", ")
        )))
    }

    /// Consume the scheduler into the final [`BuildResult`].
    pub fn into_result(self) -> BuildResult {
        let plan = self.plan;
        let dispatch_order = self
            .dispatch_order
            .iter()
            .map(|id| plan.task(*id).name().to_string())
            .collect();

        let (reports, failures) = self.state.into_parts();
        let tasks: IndexMap<TaskName, _> = plan
            .tasks()
            .map(|t| t.name().to_string())
            .zip(reports)
            .collect();

        BuildResult::new(tasks, dispatch_order, failures, self.aborted)
    }
}
