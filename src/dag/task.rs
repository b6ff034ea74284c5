// src/dag/task.rs

//! Task declarations: the input the graph builder freezes into a plan.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::dag::TaskName;
use crate::errors::{BuildError, Result};
use crate::exec::action::TaskAction;
use crate::exec::predicate::TaskPredicate;

/// A declared unit of work and its relationships to other tasks.
///
/// Nodes are immutable once added to a [`TaskSet`]; the builder is the only
/// way to construct one.
#[derive(Clone)]
pub struct TaskNode {
    pub name: TaskName,
    pub description: Option<String>,
    /// `None` for lifecycle tasks that only aggregate their dependencies.
    pub action: Option<Arc<dyn TaskAction>>,
    /// Evaluated in declaration order by the gating stage.
    pub predicates: Vec<Arc<dyn TaskPredicate>>,
    pub enabled: bool,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    /// Must complete successfully (or be skipped / up to date) first.
    pub depends_on: Vec<TaskName>,
    /// Ordering only: must be terminal first, whatever its outcome.
    pub must_run_after: Vec<TaskName>,
    /// Tasks that run after this one regardless of its outcome.
    pub finalized_by: Vec<TaskName>,
}

impl TaskNode {
    pub fn builder(name: impl Into<TaskName>) -> TaskNodeBuilder {
        TaskNodeBuilder::new(name)
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let predicates: Vec<&str> = self.predicates.iter().map(|p| p.name()).collect();
        f.debug_struct("TaskNode")
            .field("name", &self.name)
            .field("has_action", &self.action.is_some())
            .field("predicates", &predicates)
            .field("enabled", &self.enabled)
            .field("depends_on", &self.depends_on)
            .field("must_run_after", &self.must_run_after)
            .field("finalized_by", &self.finalized_by)
            .finish_non_exhaustive()
    }
}

pub struct TaskNodeBuilder {
    node: TaskNode,
}

impl TaskNodeBuilder {
    pub fn new(name: impl Into<TaskName>) -> Self {
        Self {
            node: TaskNode {
                name: name.into(),
                description: None,
                action: None,
                predicates: Vec::new(),
                enabled: true,
                inputs: Vec::new(),
                outputs: Vec::new(),
                depends_on: Vec::new(),
                must_run_after: Vec::new(),
                finalized_by: Vec::new(),
            },
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.node.description = Some(description.into());
        self
    }

    pub fn action(mut self, action: impl TaskAction + 'static) -> Self {
        self.node.action = Some(Arc::new(action));
        self
    }

    pub fn shared_action(mut self, action: Arc<dyn TaskAction>) -> Self {
        self.node.action = Some(action);
        self
    }

    pub fn only_if(mut self, predicate: impl TaskPredicate + 'static) -> Self {
        self.node.predicates.push(Arc::new(predicate));
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.node.enabled = enabled;
        self
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.node.inputs.push(path.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.node.outputs.push(path.into());
        self
    }

    pub fn depends_on(mut self, task: impl Into<TaskName>) -> Self {
        self.node.depends_on.push(task.into());
        self
    }

    pub fn must_run_after(mut self, task: impl Into<TaskName>) -> Self {
        self.node.must_run_after.push(task.into());
        self
    }

    pub fn finalized_by(mut self, task: impl Into<TaskName>) -> Self {
        self.node.finalized_by.push(task.into());
        self
    }

    pub fn build(self) -> TaskNode {
        self.node
    }
}

/// The full declared task set, in declaration order.
///
/// Declaration order is significant: it breaks ties between otherwise
/// equivalent topological orders.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    tasks: IndexMap<TaskName, Arc<TaskNode>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a task. Names must be unique.
    pub fn add(&mut self, node: TaskNode) -> Result<()> {
        if self.tasks.contains_key(&node.name) {
            return Err(BuildError::Config(format!(
                "task '{}' is declared more than once",
                node.name
            )));
        }
        self.tasks.insert(node.name.clone(), Arc::new(node));
        Ok(())
    }

    /// Builder-style variant of [`TaskSet::add`].
    pub fn with(mut self, node: TaskNode) -> Result<Self> {
        self.add(node)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TaskNode>> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskNode>> {
        self.tasks.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
