// tests/property_scheduling.rs

mod common;

use std::collections::HashMap;

use proptest::prelude::*;

use buildgraph::dag::{TaskNodeBuilder, TaskSet, freeze};
use buildgraph::outcome::TaskOutcome;
use buildgraph::types::FailurePolicy;
use buildgraph_test_utils::builders::task_set;
use buildgraph_test_utils::recording::ExecutionLog;

use crate::common::{build, options};

/// One generated task: edges only point at lower indices, so every
/// generated graph is acyclic.
#[derive(Debug, Clone)]
struct GenTask {
    depends_on: Vec<usize>,
    must_run_after: Vec<usize>,
    fails: bool,
}

fn name(i: usize) -> String {
    format!("t{i}")
}

fn gen_graph() -> impl Strategy<Value = Vec<GenTask>> {
    (1usize..9).prop_flat_map(|n| {
        (0..n)
            .map(|i| {
                // For the first task the edge lists are always empty.
                let earlier = 0..i.max(1);
                (
                    prop::collection::vec(earlier.clone(), 0..=i.min(3)),
                    prop::collection::vec(earlier, 0..=i.min(2)),
                    prop::bool::weighted(0.2),
                )
                    .prop_map(|(deps, after, fails)| GenTask {
                        depends_on: dedup(deps),
                        must_run_after: dedup(after),
                        fails,
                    })
            })
            .collect::<Vec<_>>()
    })
}

fn dedup(mut v: Vec<usize>) -> Vec<usize> {
    v.sort_unstable();
    v.dedup();
    v
}

fn declare(graph: &[GenTask], log: &ExecutionLog) -> TaskSet {
    task_set(graph.iter().enumerate().map(|(i, task)| {
        let mut builder = TaskNodeBuilder::new(name(i));
        for d in &task.depends_on {
            builder = builder.depends_on(name(*d));
        }
        for a in &task.must_run_after {
            builder = builder.must_run_after(name(*a));
        }
        let action = if task.fails {
            log.fail("generated failure")
        } else {
            log.succeed()
        };
        builder.shared_action(action).build()
    }))
}

fn all_names(graph: &[GenTask]) -> Vec<String> {
    (0..graph.len()).map(name).collect()
}

fn outcomes_at(
    graph: &[GenTask],
    concurrency: usize,
) -> (HashMap<String, TaskOutcome>, ExecutionLog) {
    let log = ExecutionLog::new();
    let tasks = declare(graph, &log);
    let names = all_names(graph);
    let requested: Vec<&str> = names.iter().map(String::as_str).collect();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("build tokio runtime");
    let result = rt.block_on(build(
        &tasks,
        &requested,
        options(concurrency, FailurePolicy::KeepGoing),
    ));

    let outcomes = result
        .tasks
        .iter()
        .map(|(name, report)| (name.clone(), report.outcome))
        .collect();
    (outcomes, log)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn plan_order_respects_every_edge(graph in gen_graph()) {
        let log = ExecutionLog::new();
        let tasks = declare(&graph, &log);
        let names = all_names(&graph);
        let plan = freeze(&tasks, &names[..]).expect("generated graph is acyclic");

        prop_assert_eq!(plan.len(), graph.len());
        for (i, task) in graph.iter().enumerate() {
            let me = plan.id_of(&name(i)).unwrap();
            for pred in task.depends_on.iter().chain(task.must_run_after.iter()) {
                prop_assert!(plan.id_of(&name(*pred)).unwrap() < me);
            }
        }
    }

    #[test]
    fn keep_going_outcomes_do_not_depend_on_concurrency(graph in gen_graph()) {
        let (serial, serial_log) = outcomes_at(&graph, 1);
        let (parallel, parallel_log) = outcomes_at(&graph, 4);

        prop_assert_eq!(&serial, &parallel);

        for (i, task) in graph.iter().enumerate() {
            let me = name(i);
            prop_assert!(serial_log.count(&me) <= 1);
            prop_assert!(parallel_log.count(&me) <= 1);

            let doomed = task
                .depends_on
                .iter()
                .any(|d| serial[&name(*d)].dooms_dependents());
            let expected = if doomed {
                TaskOutcome::FailedDependency
            } else if task.fails {
                TaskOutcome::Failed
            } else {
                TaskOutcome::Success
            };
            prop_assert_eq!(serial[&me], expected);
        }

        // A predecessor that ran was dispatched first in the concurrent run too.
        let started = parallel_log.started();
        for (i, task) in graph.iter().enumerate() {
            let Some(me) = started.iter().position(|t| *t == name(i)) else {
                continue;
            };
            for pred in task.depends_on.iter().chain(task.must_run_after.iter()) {
                if let Some(before) = started.iter().position(|t| *t == name(*pred)) {
                    prop_assert!(before < me, "{} started before {}", name(i), name(*pred));
                }
            }
        }
    }
}
