// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod observer;
pub mod outcome;
pub mod report;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{BuildSettings, ConfigFile, config_root_dir, load_and_validate};
use crate::dag::{FreezeOptions, freeze_with};
use crate::engine::{BuildExecutor, RuntimeOptions};
use crate::errors::{BuildError, Result};
use crate::exec::{FileHashStore, FingerprintUpToDate, HashStore, MemoryHashStore, Pipeline};
use crate::fs::{FileSystem, RealFileSystem};
use crate::observer::LoggingObserver;
use crate::types::HashStorageMode;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - build file loading and CLI overrides
/// - freezing the requested tasks into a plan
/// - the fingerprint-backed pipeline, runtime and executor
/// - Ctrl-C handling
///
/// Returns the process exit status for a build that ran (0 or 1); errors
/// that prevent running at all come back as `Err`.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let settings = BuildSettings::resolve(&args, &cfg)?;
    let root = config_root_dir(&config_path);

    let tasks = cfg.to_task_set(&root)?;
    let plan = freeze_with(
        &tasks,
        &settings.tasks,
        &FreezeOptions {
            excluded: settings.excluded.clone(),
        },
    )?;

    if settings.dry_run {
        print!("{}", report::render_plan(&plan));
        debug!("dry-run complete (no execution)");
        return Ok(0);
    }

    let check = fingerprint_check(&cfg, &settings, &root)?;
    let executor = BuildExecutor::new(RuntimeOptions {
        concurrency: settings.concurrency,
        failure_policy: settings.failure_policy,
    })
    .with_pipeline(Pipeline::standard(check, settings.rerun_tasks))
    .with_observer(LoggingObserver);

    info!(
        tasks = ?settings.tasks,
        concurrency = settings.concurrency,
        policy = ?settings.failure_policy,
        "starting build"
    );

    // A failed signal listener disables its branch; the build keeps going.
    let result = tokio::select! {
        result = executor.execute(Arc::new(plan)) => result?,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("interrupted; abandoning running tasks");
            return Err(BuildError::Interrupted);
        }
    };

    print!("{}", report::render(&result));
    Ok(result.exit_code())
}

/// Build the up-to-date collaborator for the configured storage mode.
fn fingerprint_check(
    cfg: &ConfigFile,
    settings: &BuildSettings,
    root: &Path,
) -> Result<Arc<FingerprintUpToDate>> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let store: Box<dyn HashStore> = match settings.hash_storage_mode {
        HashStorageMode::File => {
            Box::new(FileHashStore::new(root.to_path_buf(), Arc::clone(&fs)))
        }
        HashStorageMode::Memory => Box::new(MemoryHashStore::new()),
    };

    let check = FingerprintUpToDate::new(fs, store);
    let declared: Vec<&str> = cfg.task.keys().map(|k| k.as_str()).collect();
    check.prune(&declared)?;
    Ok(Arc::new(check))
}
