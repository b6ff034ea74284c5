// src/config/model.rs

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::types::{FailurePolicy, HashStorageMode};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// concurrency = 2
/// failure_policy = "keep-going"
/// default_tasks = ["check"]
///
/// [task.compile]
/// cmd = "cargo build"
///
/// [task.test]
/// cmd = "cargo test"
/// depends_on = ["compile"]
/// ```
///
/// Tasks keep their declaration order, which breaks ties in the
/// execution order.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`, in declaration order.
    #[serde(default)]
    pub task: IndexMap<String, TaskConfig>,
}

/// Validated configuration file.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holding one means
/// relation targets exist and `only_if` entries are well formed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub task: IndexMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, task: IndexMap<String, TaskConfig>) -> Self {
        Self { config, task }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Maximum number of tasks executing at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// `"fail-fast"` (default) or `"keep-going"`.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Where up-to-date fingerprints are kept: `"memory"` (default) or
    /// `"file"` (`.buildgraph/hashes`).
    #[serde(default)]
    pub hash_storage_mode: HashStorageMode,

    /// Tasks built when none are named on the command line.
    #[serde(default)]
    pub default_tasks: Vec<String>,
}

fn default_concurrency() -> usize {
    1
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            failure_policy: FailurePolicy::default(),
            hash_storage_mode: HashStorageMode::default(),
            default_tasks: Vec::new(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Shell command to run. Tasks without one only aggregate their
    /// dependencies.
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Tasks that must finish successfully (or be skipped / up to date)
    /// before this one runs. Pulled into the build automatically.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Ordering only: applies when both tasks are part of the build.
    #[serde(default)]
    pub must_run_after: Vec<String>,

    /// Tasks that run after this one whatever its outcome. Pulled into the
    /// build automatically.
    #[serde(default)]
    pub finalized_by: Vec<String>,

    /// Files or directories fingerprinted for up-to-date checks, relative to
    /// the build file's directory.
    #[serde(default)]
    pub inputs: Vec<PathBuf>,

    /// Files or directories the task produces. A task with no outputs is
    /// never up to date.
    #[serde(default)]
    pub outputs: Vec<PathBuf>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Gating predicates, evaluated in order.
    #[serde(default)]
    pub only_if: Vec<PredicateConfig>,
}

fn default_enabled() -> bool {
    true
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            cmd: None,
            description: None,
            depends_on: Vec::new(),
            must_run_after: Vec::new(),
            finalized_by: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            enabled: default_enabled(),
            only_if: Vec::new(),
        }
    }
}

/// One entry of `only_if`.
///
/// Exactly one of `env` / `cmd` must be set:
///
/// ```toml
/// only_if = [
///   { name = "isReleaseBranch", env = "RELEASE", equals = "1" },
///   { name = "hasDocker", cmd = "docker info" },
/// ]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredicateConfig {
    pub name: String,

    /// Satisfied when this environment variable is set and non-empty.
    #[serde(default)]
    pub env: Option<String>,

    /// With `env`: satisfied only when the variable equals this value.
    #[serde(default)]
    pub equals: Option<String>,

    /// Satisfied when this shell command exits with status 0.
    #[serde(default)]
    pub cmd: Option<String>,
}

impl TaskConfig {
    /// Every task name this task refers to, with the field it came from.
    pub fn relations(&self) -> impl Iterator<Item = (&'static str, &str)> {
        let depends = self.depends_on.iter().map(|t| ("depends_on", t.as_str()));
        let after = self
            .must_run_after
            .iter()
            .map(|t| ("must_run_after", t.as_str()));
        let finalized = self
            .finalized_by
            .iter()
            .map(|t| ("finalized_by", t.as_str()));
        depends.chain(after).chain(finalized)
    }
}
