// src/config/tasks.rs

//! Turning a validated [`ConfigFile`] into a declared [`TaskSet`].

use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, PredicateConfig, TaskConfig};
use crate::dag::{TaskNode, TaskNodeBuilder, TaskSet};
use crate::errors::{BuildError, Result};
use crate::exec::{CommandPredicate, EnvPredicate, ShellAction};

impl ConfigFile {
    /// Declare every configured task, in file order.
    ///
    /// Commands run in `root`, and relative input/output paths are resolved
    /// against it.
    pub fn to_task_set(&self, root: &Path) -> Result<TaskSet> {
        let mut tasks = TaskSet::new();
        for (name, task) in self.task.iter() {
            tasks.add(task_node(name, task, root)?)?;
        }
        Ok(tasks)
    }
}

fn task_node(name: &str, cfg: &TaskConfig, root: &Path) -> Result<TaskNode> {
    let mut builder = TaskNodeBuilder::new(name).enabled(cfg.enabled);

    if let Some(description) = &cfg.description {
        builder = builder.description(description.clone());
    }
    if let Some(cmd) = &cfg.cmd {
        builder = builder.action(ShellAction::new(cmd.clone()).current_dir(root));
    }

    for predicate in &cfg.only_if {
        builder = with_predicate(builder, name, predicate, root)?;
    }

    for path in &cfg.inputs {
        builder = builder.input(resolve(root, path));
    }
    for path in &cfg.outputs {
        builder = builder.output(resolve(root, path));
    }

    for dep in &cfg.depends_on {
        builder = builder.depends_on(dep.clone());
    }
    for dep in &cfg.must_run_after {
        builder = builder.must_run_after(dep.clone());
    }
    for finalizer in &cfg.finalized_by {
        builder = builder.finalized_by(finalizer.clone());
    }

    Ok(builder.build())
}

fn with_predicate(
    builder: TaskNodeBuilder,
    task: &str,
    cfg: &PredicateConfig,
    root: &Path,
) -> Result<TaskNodeBuilder> {
    match (&cfg.env, &cfg.cmd) {
        (Some(var), None) => {
            let mut predicate = EnvPredicate::new(cfg.name.clone(), var.clone());
            if let Some(value) = &cfg.equals {
                predicate = predicate.equals(value.clone());
            }
            Ok(builder.only_if(predicate))
        }
        (None, Some(cmd)) => Ok(builder.only_if(
            CommandPredicate::new(cfg.name.clone(), cmd.clone()).current_dir(root),
        )),
        _ => Err(BuildError::Config(format!(
            "task '{task}': `only_if` '{}' must set exactly one of `env` or `cmd`",
            cfg.name
        ))),
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
