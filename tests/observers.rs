// tests/observers.rs

mod common;

use std::sync::Arc;

use buildgraph::dag::{ScheduledTask, TaskNode, TaskNodeBuilder};
use buildgraph::engine::BuildExecutor;
use buildgraph::exec::{FnPredicate, NeverUpToDate, Pipeline};
use buildgraph::observer::ObserverList;
use buildgraph::outcome::TaskOutcome;
use buildgraph::types::FailurePolicy;
use buildgraph_test_utils::builders::task_set;
use buildgraph_test_utils::init_tracing;
use buildgraph_test_utils::recording::{
    ExecutionLog, FailingObserver, PanickingObserver, RecordingObserver,
};

use crate::common::{build_with, options};

#[tokio::test]
async fn single_task_build_fires_hooks_in_nesting_order() {
    init_tracing();
    let recorder = RecordingObserver::new();
    let tasks = task_set([TaskNodeBuilder::new("compile").build()]);

    let executor =
        BuildExecutor::new(options(1, FailurePolicy::FailFast)).with_observer(recorder.clone());
    let result = build_with(&tasks, &["compile"], executor).await;
    assert!(result.succeeded());

    assert_eq!(
        recorder.events(),
        vec![
            "before_graph",
            "before_task:compile",
            "before_stage:compile:gating",
            "before_stage:compile:up-to-date",
            "before_stage:compile:output-capture",
            "before_stage:compile:action",
            "after_stage:compile:action:SUCCESS",
            "after_stage:compile:output-capture:SUCCESS",
            "after_stage:compile:up-to-date:SUCCESS",
            "after_stage:compile:gating:SUCCESS",
            "after_task:compile:SUCCESS",
            "after_graph:BUILD SUCCESSFUL",
        ]
    );
}

#[test]
fn skipped_task_only_sees_the_gating_stage() {
    let recorder = RecordingObserver::new();
    let observers = ObserverList::new().with(recorder.clone());
    let node = TaskNodeBuilder::new("deploy")
        .only_if(FnPredicate::new("isReleaseBranch", |_: &TaskNode| Ok(false)))
        .build();

    let task = ScheduledTask {
        id: 0,
        name: "deploy".to_string(),
        node: Arc::new(node),
    };
    Pipeline::standard(Arc::new(NeverUpToDate), false).run(&task, &observers);

    assert_eq!(
        recorder.events(),
        vec![
            "before_task:deploy",
            "before_stage:deploy:gating",
            "after_stage:deploy:gating:SKIPPED",
            "after_task:deploy:SKIPPED",
        ]
    );
}

#[tokio::test]
async fn failing_and_panicking_observers_do_not_change_outcomes() {
    init_tracing();
    let log = ExecutionLog::new();
    let recorder = RecordingObserver::new();
    let tasks = task_set([
        TaskNodeBuilder::new("compile").shared_action(log.succeed()).build(),
        TaskNodeBuilder::new("test")
            .depends_on("compile")
            .shared_action(log.succeed())
            .build(),
    ]);

    let executor = BuildExecutor::new(options(2, FailurePolicy::FailFast))
        .with_observer(FailingObserver)
        .with_observer(PanickingObserver)
        .with_observer(recorder.clone());
    let result = build_with(&tasks, &["test"], executor).await;

    assert!(result.succeeded());
    assert_eq!(log.started(), vec!["compile", "test"]);
    assert_eq!(result.outcome_of("test"), Some(TaskOutcome::Success));

    // Observers registered after the misbehaving ones are still notified.
    assert_eq!(recorder.count_prefix("after_stage:"), 8);
    assert_eq!(recorder.count_prefix("after_task:"), 2);
    assert_eq!(
        recorder.events().last().map(String::as_str),
        Some("after_graph:BUILD SUCCESSFUL")
    );
}

#[tokio::test]
async fn failed_dependencies_are_reported_without_stage_hooks() {
    init_tracing();
    let log = ExecutionLog::new();
    let recorder = RecordingObserver::new();
    let tasks = task_set([
        TaskNodeBuilder::new("compile").shared_action(log.fail("syntax error")).build(),
        TaskNodeBuilder::new("test")
            .depends_on("compile")
            .shared_action(log.succeed())
            .build(),
    ]);

    let executor =
        BuildExecutor::new(options(1, FailurePolicy::KeepGoing)).with_observer(recorder.clone());
    let result = build_with(&tasks, &["test"], executor).await;

    assert!(!result.succeeded());
    assert_eq!(
        recorder.task_events("test"),
        vec!["after_task:test:FAILED_DEPENDENCY"]
    );
    assert_eq!(
        recorder.events().last().map(String::as_str),
        Some("after_graph:BUILD FAILED")
    );
}

#[tokio::test]
async fn idle_finalizer_is_reported_skipped_without_running() {
    init_tracing();
    let log = ExecutionLog::new();
    let recorder = RecordingObserver::new();
    let tasks = task_set([
        TaskNodeBuilder::new("compile").shared_action(log.fail("syntax error")).build(),
        TaskNodeBuilder::new("test")
            .depends_on("compile")
            .finalized_by("report")
            .shared_action(log.succeed())
            .build(),
        TaskNodeBuilder::new("report").shared_action(log.succeed()).build(),
    ]);

    let executor =
        BuildExecutor::new(options(2, FailurePolicy::KeepGoing)).with_observer(recorder.clone());
    let result = build_with(&tasks, &["test"], executor).await;

    assert_eq!(result.outcome_of("report"), Some(TaskOutcome::Skipped));
    assert!(!log.ran("report"));
    assert_eq!(
        recorder.task_events("report"),
        vec!["after_task:report:SKIPPED"]
    );
}
