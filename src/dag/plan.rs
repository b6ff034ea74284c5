// src/dag/plan.rs

//! Freezing a declared [`TaskSet`] into an immutable [`ExecutionPlan`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info};

use crate::dag::TaskName;
use crate::dag::graph::{DagGraph, EdgeKind};
use crate::dag::task::{TaskNode, TaskSet};
use crate::errors::{BuildError, Result};

/// Position of a task in the plan's topological order.
pub type TaskId = usize;

/// A task as it participates in one plan, with relations resolved to ids.
#[derive(Debug, Clone)]
pub struct PlannedTask {
    pub id: TaskId,
    pub node: Arc<TaskNode>,
    /// `depends_on` predecessors inside the plan.
    pub depends_on: Vec<TaskId>,
    /// `must_run_after` predecessors inside the plan.
    pub must_run_after: Vec<TaskId>,
    /// Tasks this task finalizes (it waits for all of them).
    pub finalizes: Vec<TaskId>,
    /// Tasks that list this one in `depends_on`.
    pub dependents: Vec<TaskId>,
    /// Every task that waits on this one through any edge kind.
    pub successors: Vec<TaskId>,
    /// Whether the task was named by the caller rather than pulled in.
    pub requested: bool,
}

impl PlannedTask {
    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn is_finalizer(&self) -> bool {
        !self.finalizes.is_empty()
    }
}

/// Knobs for [`freeze_with`].
#[derive(Debug, Clone, Default)]
pub struct FreezeOptions {
    /// Tasks removed from the closure. They are neither scheduled nor
    /// traversed, and relations pointing at them are dropped.
    pub excluded: Vec<TaskName>,
}

/// The frozen, validated subgraph for one build invocation.
///
/// Tasks are stored in topological order; a [`TaskId`] is a position in
/// that order. Immutable once built.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    tasks: Vec<PlannedTask>,
    index: HashMap<TaskName, TaskId>,
    requested: Vec<TaskName>,
}

impl ExecutionPlan {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: TaskId) -> &PlannedTask {
        &self.tasks[id]
    }

    pub fn get(&self, name: &str) -> Option<&PlannedTask> {
        self.index.get(name).map(|id| &self.tasks[*id])
    }

    pub fn id_of(&self, name: &str) -> Option<TaskId> {
        self.index.get(name).copied()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &PlannedTask> {
        self.tasks.iter()
    }

    /// Task names in topological order.
    pub fn order(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    pub fn requested(&self) -> &[TaskName] {
        &self.requested
    }
}

/// Freeze `tasks` into a plan for the `requested` entry tasks.
pub fn freeze<S: AsRef<str>>(tasks: &TaskSet, requested: &[S]) -> Result<ExecutionPlan> {
    freeze_with(tasks, requested, &FreezeOptions::default())
}

/// [`freeze`] with exclusions.
///
/// Steps:
/// 1. resolve requested names (unknown → [`BuildError::UnknownTask`])
/// 2. transitive closure over `depends_on` and `finalized_by`
/// 3. build the graph, adding `must_run_after` edges only between tasks
///    already in the closure
/// 4. reject cycles, then order by Kahn's algorithm with declaration-order
///    tie-breaking
pub fn freeze_with<S: AsRef<str>>(
    tasks: &TaskSet,
    requested: &[S],
    options: &FreezeOptions,
) -> Result<ExecutionPlan> {
    if requested.is_empty() {
        return Err(BuildError::NoTasksRequested);
    }

    let excluded: HashSet<&str> = options.excluded.iter().map(|s| s.as_str()).collect();
    for name in &excluded {
        if !tasks.contains(name) {
            return Err(BuildError::UnknownTask(name.to_string()));
        }
    }

    let mut requested_names: Vec<TaskName> = Vec::new();
    for name in requested {
        let name = name.as_ref();
        if !tasks.contains(name) {
            return Err(BuildError::UnknownTask(name.to_string()));
        }
        if excluded.contains(name) {
            return Err(BuildError::Config(format!(
                "task '{name}' is both requested and excluded"
            )));
        }
        if !requested_names.iter().any(|n| n == name) {
            requested_names.push(name.to_string());
        }
    }

    let closure = compute_closure(tasks, &requested_names, &excluded)?;

    let graph = build_graph(tasks, &closure)?;
    graph.check_acyclic()?;
    let order = graph.topological_order()?;

    let mut index: HashMap<TaskName, TaskId> = HashMap::with_capacity(order.len());
    for (pos, node_idx) in order.iter().enumerate() {
        index.insert(graph.node(*node_idx).task.name.clone(), pos);
    }

    let to_ids = |nodes: Vec<petgraph::graph::NodeIndex>| -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = nodes
            .into_iter()
            .filter_map(|n| index.get(&graph.node(n).task.name).copied())
            .collect();
        ids.sort_unstable();
        ids
    };

    let mut planned = Vec::with_capacity(order.len());
    for (pos, node_idx) in order.iter().enumerate() {
        let node = graph.node(*node_idx).task.clone();

        let mut successors = to_ids(graph.successors(*node_idx, EdgeKind::DependsOn));
        successors.extend(to_ids(graph.successors(*node_idx, EdgeKind::MustRunAfter)));
        successors.extend(to_ids(graph.successors(*node_idx, EdgeKind::FinalizedBy)));
        successors.sort_unstable();
        successors.dedup();

        planned.push(PlannedTask {
            id: pos,
            requested: requested_names.iter().any(|n| *n == node.name),
            depends_on: to_ids(graph.predecessors(*node_idx, EdgeKind::DependsOn)),
            must_run_after: to_ids(graph.predecessors(*node_idx, EdgeKind::MustRunAfter)),
            finalizes: to_ids(graph.predecessors(*node_idx, EdgeKind::FinalizedBy)),
            dependents: to_ids(graph.successors(*node_idx, EdgeKind::DependsOn)),
            successors,
            node,
        });
    }

    let plan = ExecutionPlan {
        tasks: planned,
        index,
        requested: requested_names,
    };

    info!(
        requested = ?plan.requested(),
        tasks = plan.len(),
        "task graph frozen"
    );
    debug!(order = ?plan.order(), "execution plan order");

    Ok(plan)
}

/// Names of every task reachable from `requested` through `depends_on` and
/// `finalized_by`, skipping excluded tasks.
fn compute_closure(
    tasks: &TaskSet,
    requested: &[TaskName],
    excluded: &HashSet<&str>,
) -> Result<HashSet<TaskName>> {
    let mut closure: HashSet<TaskName> = HashSet::new();
    let mut queue: VecDeque<TaskName> = requested.iter().cloned().collect();

    while let Some(name) = queue.pop_front() {
        if !closure.insert(name.clone()) {
            continue;
        }

        let node = tasks
            .get(&name)
            .ok_or_else(|| BuildError::UnknownTask(name.clone()))?;

        for target in node.depends_on.iter().chain(node.finalized_by.iter()) {
            if !tasks.contains(target) {
                return Err(BuildError::UnknownTask(format!(
                    "{target} (referenced by '{name}')"
                )));
            }
            if excluded.contains(target.as_str()) {
                debug!(task = %name, excluded = %target, "dropping relation to excluded task");
                continue;
            }
            if !closure.contains(target) {
                queue.push_back(target.clone());
            }
        }

        for target in &node.must_run_after {
            if !tasks.contains(target) {
                return Err(BuildError::UnknownTask(format!(
                    "{target} (referenced by '{name}')"
                )));
            }
        }
    }

    Ok(closure)
}

fn build_graph(tasks: &TaskSet, closure: &HashSet<TaskName>) -> Result<DagGraph> {
    let mut graph = DagGraph::new();

    for (decl_idx, node) in tasks.iter().enumerate() {
        if closure.contains(&node.name) {
            graph.add_task(Arc::clone(node), decl_idx);
        }
    }

    for node in tasks.iter().filter(|n| closure.contains(&n.name)) {
        for dep in &node.depends_on {
            if graph.contains(dep) {
                graph.add_edge(dep, &node.name, EdgeKind::DependsOn)?;
            }
        }
        for earlier in &node.must_run_after {
            if graph.contains(earlier) {
                graph.add_edge(earlier, &node.name, EdgeKind::MustRunAfter)?;
            }
        }
        for finalizer in &node.finalized_by {
            if graph.contains(finalizer) {
                graph.add_edge(&node.name, finalizer, EdgeKind::FinalizedBy)?;
            }
        }
    }

    Ok(graph)
}
