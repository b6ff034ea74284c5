// src/exec/up_to_date.rs

//! The up-to-date collaborator consulted before a task's action runs.

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use tracing::debug;

use crate::dag::task::TaskNode;
use crate::exec::fingerprint::{HashStore, compute_fingerprint};
use crate::fs::FileSystem;

/// Decides whether a task's previous outputs are still valid.
///
/// `is_up_to_date` runs before the action; `record` runs after a successful
/// action so the next build can compare against it.
pub trait UpToDateCheck: Send + Sync {
    fn is_up_to_date(&self, task: &TaskNode) -> Result<bool>;

    fn record(&self, _task: &TaskNode) -> Result<()> {
        Ok(())
    }
}

/// Every task always runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverUpToDate;

impl UpToDateCheck for NeverUpToDate {
    fn is_up_to_date(&self, _task: &TaskNode) -> Result<bool> {
        Ok(false)
    }
}

/// Compares a blake3 fingerprint of inputs and outputs with the one stored
/// after the task last succeeded.
///
/// A task without declared outputs is never up to date.
#[derive(Debug)]
pub struct FingerprintUpToDate {
    fs: Arc<dyn FileSystem>,
    store: Mutex<Box<dyn HashStore>>,
}

impl FingerprintUpToDate {
    pub fn new(fs: Arc<dyn FileSystem>, store: Box<dyn HashStore>) -> Self {
        Self {
            fs,
            store: Mutex::new(store),
        }
    }

    /// Drop stored fingerprints of tasks no longer declared.
    pub fn prune(&self, active_tasks: &[&str]) -> Result<()> {
        self.store
            .lock()
            .map_err(|_| anyhow!("hash store lock poisoned"))?
            .prune(active_tasks)
    }
}

impl UpToDateCheck for FingerprintUpToDate {
    fn is_up_to_date(&self, task: &TaskNode) -> Result<bool> {
        if task.outputs.is_empty() {
            return Ok(false);
        }
        if let Some(missing) = task.outputs.iter().find(|p| !self.fs.exists(p)) {
            debug!(task = %task.name, output = ?missing, "declared output missing; not up to date");
            return Ok(false);
        }

        let current = compute_fingerprint(self.fs.as_ref(), task)?;
        let stored = self
            .store
            .lock()
            .map_err(|_| anyhow!("hash store lock poisoned"))?
            .load(&task.name)?;

        let up_to_date = stored.as_deref() == Some(current.as_str());
        debug!(task = %task.name, up_to_date, "compared task fingerprint");
        Ok(up_to_date)
    }

    fn record(&self, task: &TaskNode) -> Result<()> {
        if task.outputs.is_empty() {
            return Ok(());
        }
        if let Some(missing) = task.outputs.iter().find(|p| !self.fs.exists(p)) {
            bail!("declared output {:?} was not produced", missing);
        }

        let fingerprint = compute_fingerprint(self.fs.as_ref(), task)?;
        self.store
            .lock()
            .map_err(|_| anyhow!("hash store lock poisoned"))?
            .save(&task.name, &fingerprint)
    }
}
