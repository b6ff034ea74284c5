// tests/pipeline_stages.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};

use buildgraph::dag::{ScheduledTask, TaskNode, TaskNodeBuilder};
use buildgraph::errors::TaskError;
use buildgraph::exec::{
    ActionStage, FnPredicate, GatingStage, Next, NeverUpToDate, Pipeline, Stage, UpToDateCheck,
};
use buildgraph::observer::ObserverList;
use buildgraph::outcome::{TaskExecution, TaskOutcome};
use buildgraph_test_utils::recording::ExecutionLog;

fn scheduled(node: TaskNode) -> ScheduledTask {
    ScheduledTask {
        id: 0,
        name: node.name.clone(),
        node: Arc::new(node),
    }
}

fn run(pipeline: &Pipeline, node: TaskNode) -> TaskExecution {
    pipeline.run(&scheduled(node), &ObserverList::new())
}

fn standard() -> Pipeline {
    Pipeline::standard(Arc::new(NeverUpToDate), false)
}

#[derive(Clone, Copy)]
enum Verdict {
    Fresh,
    Stale,
    Broken,
}

/// Scripted up-to-date collaborator that counts `record` calls.
struct StubCheck {
    verdict: Verdict,
    record_fails: bool,
    recorded: AtomicUsize,
}

impl StubCheck {
    fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            record_fails: false,
            recorded: AtomicUsize::new(0),
        }
    }

    fn failing_record(mut self) -> Self {
        self.record_fails = true;
        self
    }
}

impl UpToDateCheck for StubCheck {
    fn is_up_to_date(&self, _task: &TaskNode) -> Result<bool> {
        match self.verdict {
            Verdict::Fresh => Ok(true),
            Verdict::Stale => Ok(false),
            Verdict::Broken => bail!("hash store unreadable"),
        }
    }

    fn record(&self, _task: &TaskNode) -> Result<()> {
        self.recorded.fetch_add(1, Ordering::SeqCst);
        if self.record_fails {
            bail!("disk full");
        }
        Ok(())
    }
}

#[test]
fn standard_pipeline_has_fixed_stage_order() {
    assert_eq!(
        standard().stage_names(),
        vec!["gating", "up-to-date", "output-capture", "action"]
    );
}

#[test]
fn task_without_action_succeeds() {
    let execution = run(&standard(), TaskNodeBuilder::new("assemble").build());
    assert_eq!(execution.outcome, TaskOutcome::Success);
    assert!(execution.error.is_none());
}

#[test]
fn predicate_error_fails_without_running_action() {
    let log = ExecutionLog::new();
    let node = TaskNodeBuilder::new("publish")
        .only_if(FnPredicate::new("hasCredentials", |_: &TaskNode| {
            Err(anyhow!("keychain locked"))
        }))
        .shared_action(log.succeed())
        .build();

    let execution = run(&standard(), node);

    assert_eq!(execution.outcome, TaskOutcome::Failed);
    assert!(!log.ran("publish"));
    match execution.error.as_deref() {
        Some(TaskError::PredicateEvaluation { predicate, .. }) => {
            assert_eq!(predicate, "hasCredentials");
        }
        other => panic!("expected PredicateEvaluation, got {other:?}"),
    }
}

#[test]
fn predicates_stop_at_the_first_false() {
    let evaluated = Arc::new(AtomicUsize::new(0));
    let counter = |result: bool| {
        let evaluated = Arc::clone(&evaluated);
        move |_: &TaskNode| {
            evaluated.fetch_add(1, Ordering::SeqCst);
            Ok::<bool, anyhow::Error>(result)
        }
    };

    let node = TaskNodeBuilder::new("deploy")
        .only_if(FnPredicate::new("onCi", counter(true)))
        .only_if(FnPredicate::new("isReleaseBranch", counter(false)))
        .only_if(FnPredicate::new("never", counter(true)))
        .build();

    let execution = run(&standard(), node);

    assert_eq!(execution.outcome, TaskOutcome::Skipped);
    assert_eq!(
        execution.skip_reason.as_deref(),
        Some("'isReleaseBranch' not satisfied")
    );
    assert_eq!(evaluated.load(Ordering::SeqCst), 2);
}

#[test]
fn fresh_outputs_skip_the_action() {
    let log = ExecutionLog::new();
    let check = Arc::new(StubCheck::new(Verdict::Fresh));
    let pipeline = Pipeline::standard(check.clone(), false);

    let node = TaskNodeBuilder::new("compile")
        .shared_action(log.succeed())
        .build();
    let execution = run(&pipeline, node);

    assert_eq!(execution.outcome, TaskOutcome::UpToDate);
    assert!(!log.ran("compile"));
    assert_eq!(check.recorded.load(Ordering::SeqCst), 0);
}

#[test]
fn stale_outputs_run_the_action_and_record() {
    let log = ExecutionLog::new();
    let check = Arc::new(StubCheck::new(Verdict::Stale));
    let pipeline = Pipeline::standard(check.clone(), false);

    let node = TaskNodeBuilder::new("compile")
        .shared_action(log.succeed())
        .build();
    let execution = run(&pipeline, node);

    assert_eq!(execution.outcome, TaskOutcome::Success);
    assert!(log.ran("compile"));
    assert_eq!(check.recorded.load(Ordering::SeqCst), 1);
}

#[test]
fn broken_up_to_date_check_fails_the_task() {
    let log = ExecutionLog::new();
    let pipeline = Pipeline::standard(Arc::new(StubCheck::new(Verdict::Broken)), false);

    let node = TaskNodeBuilder::new("compile")
        .shared_action(log.succeed())
        .build();
    let execution = run(&pipeline, node);

    assert_eq!(execution.outcome, TaskOutcome::Failed);
    assert!(matches!(
        execution.error.as_deref(),
        Some(TaskError::UpToDateCheck { .. })
    ));
    assert!(!log.ran("compile"));
}

#[test]
fn failed_output_recording_turns_success_into_failure() {
    let log = ExecutionLog::new();
    let pipeline = Pipeline::standard(
        Arc::new(StubCheck::new(Verdict::Stale).failing_record()),
        false,
    );

    let node = TaskNodeBuilder::new("jar").shared_action(log.succeed()).build();
    let execution = run(&pipeline, node);

    assert!(log.ran("jar"));
    assert_eq!(execution.outcome, TaskOutcome::Failed);
    let error = execution.error.expect("failure carries an error");
    assert!(matches!(error.as_ref(), TaskError::Finalization { .. }));
    assert!(error.chain().contains("disk full"));
}

#[test]
fn failed_action_is_not_recorded() {
    let log = ExecutionLog::new();
    let check = Arc::new(StubCheck::new(Verdict::Stale));
    let pipeline = Pipeline::standard(check.clone(), false);

    let node = TaskNodeBuilder::new("jar").shared_action(log.fail("zip error")).build();
    let execution = run(&pipeline, node);

    assert_eq!(execution.outcome, TaskOutcome::Failed);
    assert_eq!(check.recorded.load(Ordering::SeqCst), 0);
}

#[test]
fn rerun_bypasses_the_check_but_still_records() {
    let log = ExecutionLog::new();
    let check = Arc::new(StubCheck::new(Verdict::Fresh));
    let pipeline = Pipeline::standard(check.clone(), true);

    let node = TaskNodeBuilder::new("compile")
        .shared_action(log.succeed())
        .build();
    let execution = run(&pipeline, node);

    assert_eq!(execution.outcome, TaskOutcome::Success);
    assert!(log.ran("compile"));
    assert_eq!(check.recorded.load(Ordering::SeqCst), 1);
}

#[test]
fn panicking_action_becomes_an_action_failure() {
    let log = ExecutionLog::new();
    let node = TaskNodeBuilder::new("flaky").shared_action(log.panic("index out of range")).build();

    let execution = run(&standard(), node);

    assert_eq!(execution.outcome, TaskOutcome::Failed);
    let error = execution.error.expect("failure carries an error");
    assert!(matches!(error.as_ref(), TaskError::Action { .. }));
    assert!(error.chain().contains("index out of range"));
}

struct ExplodingStage;

impl Stage for ExplodingStage {
    fn name(&self) -> &'static str {
        "exploding"
    }

    fn execute(&self, _task: &TaskNode, _execution: &mut TaskExecution, _next: Next<'_>) {
        panic!("stage invariant broken");
    }
}

#[test]
fn panicking_stage_fails_the_task_and_stops_the_chain() {
    let log = ExecutionLog::new();
    let pipeline = Pipeline::new(vec![
        Arc::new(GatingStage),
        Arc::new(ExplodingStage),
        Arc::new(ActionStage),
    ]);

    let node = TaskNodeBuilder::new("compile")
        .shared_action(log.succeed())
        .build();
    let execution = run(&pipeline, node);

    assert_eq!(execution.outcome, TaskOutcome::Failed);
    assert!(!log.ran("compile"));
    match execution.error.as_deref() {
        Some(TaskError::StagePanicked { stage, message }) => {
            assert_eq!(*stage, "exploding");
            assert_eq!(message, "stage invariant broken");
        }
        other => panic!("expected StagePanicked, got {other:?}"),
    }
}

#[test]
fn action_stage_is_terminal() {
    let pipeline = Pipeline::new(vec![Arc::new(ActionStage), Arc::new(ExplodingStage)]);
    let execution = run(&pipeline, TaskNodeBuilder::new("assemble").build());
    assert_eq!(execution.outcome, TaskOutcome::Success);
}
