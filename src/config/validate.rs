// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BuildError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_relations(cfg)?;
    validate_predicates(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(BuildError::Config(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.concurrency == 0 {
        return Err(BuildError::Config(
            "[config].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }

    for name in &cfg.config.default_tasks {
        if !cfg.task.contains_key(name) {
            return Err(BuildError::Config(format!(
                "[config].default_tasks names unknown task '{name}'"
            )));
        }
    }

    Ok(())
}

fn validate_task_relations(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for (field, target) in task.relations() {
            if !cfg.task.contains_key(target) {
                return Err(BuildError::Config(format!(
                    "task '{name}' has unknown task '{target}' in `{field}`"
                )));
            }
            if target == name {
                return Err(BuildError::Config(format!(
                    "task '{name}' cannot refer to itself in `{field}`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_predicates(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for predicate in &task.only_if {
            if predicate.name.trim().is_empty() {
                return Err(BuildError::Config(format!(
                    "task '{name}' has an `only_if` entry without a name"
                )));
            }
            match (&predicate.env, &predicate.cmd) {
                (Some(_), None) => {}
                (None, Some(_)) if predicate.equals.is_none() => {}
                (None, Some(_)) => {
                    return Err(BuildError::Config(format!(
                        "task '{name}': `only_if` '{}' uses `equals` without `env`",
                        predicate.name
                    )));
                }
                _ => {
                    return Err(BuildError::Config(format!(
                        "task '{name}': `only_if` '{}' must set exactly one of `env` or `cmd`",
                        predicate.name
                    )));
                }
            }
        }
    }
    Ok(())
}
