// src/config/settings.rs

//! Effective settings for one invocation: CLI flags layered over the build
//! file's `[config]` section.

use tracing::debug;

use crate::cli::CliArgs;
use crate::config::model::ConfigFile;
use crate::dag::TaskName;
use crate::errors::{BuildError, Result};
use crate::types::{FailurePolicy, HashStorageMode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Entry tasks, in the order given.
    pub tasks: Vec<TaskName>,
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    pub excluded: Vec<TaskName>,
    pub rerun_tasks: bool,
    pub hash_storage_mode: HashStorageMode,
    pub dry_run: bool,
}

impl BuildSettings {
    /// CLI values win; anything not given on the command line comes from the
    /// build file.
    pub fn resolve(args: &CliArgs, cfg: &ConfigFile) -> Result<Self> {
        let tasks = if args.tasks.is_empty() {
            cfg.config.default_tasks.clone()
        } else {
            args.tasks.clone()
        };
        if tasks.is_empty() {
            return Err(BuildError::NoTasksRequested);
        }

        let concurrency = args.jobs.unwrap_or(cfg.config.concurrency);
        if concurrency == 0 {
            return Err(BuildError::Config("--jobs must be >= 1 (got 0)".to_string()));
        }

        let failure_policy = if args.keep_going {
            FailurePolicy::KeepGoing
        } else if args.fail_fast {
            FailurePolicy::FailFast
        } else {
            cfg.config.failure_policy
        };

        let settings = Self {
            tasks,
            concurrency,
            failure_policy,
            excluded: args.exclude_task.clone(),
            rerun_tasks: args.rerun_tasks,
            hash_storage_mode: cfg.config.hash_storage_mode,
            dry_run: args.dry_run,
        };
        debug!(?settings, "resolved build settings");
        Ok(settings)
    }
}
