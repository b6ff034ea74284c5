// src/exec/predicate.rs

//! Gating predicates ("only if" checks).

use std::env::{self, VarError};
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result, bail};

use crate::dag::task::TaskNode;
use crate::exec::action::shell_command;

/// A named boolean check that decides whether a task runs.
///
/// `Ok(false)` skips the task; `Err(_)` means the check itself broke and
/// fails the task.
pub trait TaskPredicate: Send + Sync {
    /// Human-readable name, used in the skip reason.
    fn name(&self) -> &str;
    fn evaluate(&self, task: &TaskNode) -> Result<bool>;
}

/// Adapts a closure into a [`TaskPredicate`].
pub struct FnPredicate<F> {
    name: String,
    f: F,
}

impl<F> FnPredicate<F>
where
    F: Fn(&TaskNode) -> Result<bool> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> TaskPredicate for FnPredicate<F>
where
    F: Fn(&TaskNode) -> Result<bool> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, task: &TaskNode) -> Result<bool> {
        (self.f)(task)
    }
}

/// Satisfied when an environment variable is set (and non-empty), or equal
/// to a given value when `equals` is configured.
#[derive(Debug, Clone)]
pub struct EnvPredicate {
    name: String,
    var: String,
    equals: Option<String>,
}

impl EnvPredicate {
    pub fn new(name: impl Into<String>, var: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            var: var.into(),
            equals: None,
        }
    }

    pub fn equals(mut self, value: impl Into<String>) -> Self {
        self.equals = Some(value.into());
        self
    }
}

impl TaskPredicate for EnvPredicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, _task: &TaskNode) -> Result<bool> {
        match env::var(&self.var) {
            Ok(value) => Ok(match &self.equals {
                Some(expected) => value == *expected,
                None => !value.is_empty(),
            }),
            Err(VarError::NotPresent) => Ok(false),
            Err(VarError::NotUnicode(_)) => {
                bail!("environment variable {} is not valid unicode", self.var)
            }
        }
    }
}

/// Satisfied when a shell command exits with status 0.
///
/// Failing to spawn the command is an evaluation error, not "false".
#[derive(Debug, Clone)]
pub struct CommandPredicate {
    name: String,
    cmd: String,
    current_dir: Option<PathBuf>,
}

impl CommandPredicate {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            current_dir: None,
        }
    }

    /// Run the check in `dir`, the same directory the task's action uses.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

impl TaskPredicate for CommandPredicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, task: &TaskNode) -> Result<bool> {
        let mut command = shell_command(&self.cmd);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        let status = command
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| {
                format!("running onlyIf command `{}` for task '{}'", self.cmd, task.name)
            })?;
        Ok(status.success())
    }
}
