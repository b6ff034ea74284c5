#![allow(dead_code)]

use buildgraph::config::{
    ConfigFile, ConfigSection, PredicateConfig, RawConfigFile, TaskConfig,
};
use buildgraph::dag::{TaskNode, TaskNodeBuilder, TaskSet};
use buildgraph::types::{FailurePolicy, HashStorageMode};
use indexmap::IndexMap;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: IndexMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.config.concurrency = n;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.config.failure_policy = policy;
        self
    }

    pub fn hash_storage_mode(mut self, mode: HashStorageMode) -> Self {
        self.config.config.hash_storage_mode = mode;
        self
    }

    pub fn default_task(mut self, name: &str) -> Self {
        self.config.config.default_tasks.push(name.to_string());
        self
    }

    /// The unvalidated file, for exercising validation errors.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// A lifecycle task with no command.
    pub fn lifecycle() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.task.depends_on.push(dep.to_string());
        self
    }

    pub fn must_run_after(mut self, dep: &str) -> Self {
        self.task.must_run_after.push(dep.to_string());
        self
    }

    pub fn finalized_by(mut self, finalizer: &str) -> Self {
        self.task.finalized_by.push(finalizer.to_string());
        self
    }

    pub fn input(mut self, path: &str) -> Self {
        self.task.inputs.push(path.into());
        self
    }

    pub fn output(mut self, path: &str) -> Self {
        self.task.outputs.push(path.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.task.enabled = enabled;
        self
    }

    pub fn only_if_env(mut self, name: &str, var: &str, equals: Option<&str>) -> Self {
        self.task.only_if.push(PredicateConfig {
            name: name.to_string(),
            env: Some(var.to_string()),
            equals: equals.map(str::to_string),
            cmd: None,
        });
        self
    }

    pub fn only_if_cmd(mut self, name: &str, cmd: &str) -> Self {
        self.task.only_if.push(PredicateConfig {
            name: name.to_string(),
            env: None,
            equals: None,
            cmd: Some(cmd.to_string()),
        });
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Build a `TaskSet` from fully configured nodes, panicking on duplicates.
pub fn task_set(nodes: impl IntoIterator<Item = TaskNode>) -> TaskSet {
    let mut tasks = TaskSet::new();
    for node in nodes {
        tasks.add(node).expect("duplicate task in test task set");
    }
    tasks
}

/// A task with no action and the given `depends_on` edges.
pub fn lifecycle_task(name: &str, depends_on: &[&str]) -> TaskNode {
    depends_on
        .iter()
        .fold(TaskNodeBuilder::new(name), |b, dep| b.depends_on(*dep))
        .build()
}
