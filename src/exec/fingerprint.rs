// src/exec/fingerprint.rs

//! Content fingerprints of task inputs and outputs, and where they are kept
//! between builds.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::{debug, info};

use crate::dag::TaskName;
use crate::dag::task::TaskNode;
use crate::fs::FileSystem;

/// Relative path (from the project root) to the hashes file.
///
/// The effective path on disk is `<root>/.buildgraph/hashes`, where `<root>`
/// is the directory holding the build file.
pub const HASH_FILE_PATH: &str = ".buildgraph/hashes";

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Compute a deterministic fingerprint over a task's declared inputs and
/// outputs.
///
/// Directories are walked recursively. A missing path contributes a marker,
/// so creating or deleting it changes the fingerprint. Declaration order of
/// the paths does not matter.
pub fn compute_fingerprint(fs: &dyn FileSystem, task: &TaskNode) -> Result<String> {
    let mut hasher = Hasher::new();

    for (kind, paths) in [("in", &task.inputs), ("out", &task.outputs)] {
        let mut sorted: Vec<&PathBuf> = paths.iter().collect();
        sorted.sort();
        for path in sorted {
            hash_path(fs, &mut hasher, kind, path)?;
        }
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(task = %task.name, hash = %hash, "computed task fingerprint");
    Ok(hash)
}

fn hash_path(fs: &dyn FileSystem, hasher: &mut Hasher, kind: &str, path: &Path) -> Result<()> {
    hasher.update(kind.as_bytes());
    hasher.update(path.to_string_lossy().as_bytes());

    if fs.is_file(path) {
        hasher.update(compute_file_hash(fs, path)?.as_bytes());
    } else if fs.is_dir(path) {
        let mut entries = fs.read_dir(path)?;
        entries.sort();
        for entry in entries {
            hash_path(fs, hasher, kind, &entry)?;
        }
    } else {
        hasher.update(b"<missing>");
    }
    Ok(())
}

/// Abstract storage for task fingerprints.
pub trait HashStore: Send + Sync + Debug {
    fn load(&self, task: &str) -> Result<Option<String>>;
    fn save(&mut self, task: &str, hash: &str) -> Result<()>;
    /// Remove hashes for tasks that are not in the `active_tasks` list.
    fn prune(&mut self, active_tasks: &[&str]) -> Result<()>;
}

/// Stores hashes in a file (`.buildgraph/hashes`).
#[derive(Debug)]
pub struct FileHashStore {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileHashStore {
    pub fn new(root: PathBuf, fs: Arc<dyn FileSystem>) -> Self {
        Self { root, fs }
    }

    fn path(&self) -> PathBuf {
        self.root.join(HASH_FILE_PATH)
    }

    fn load_all(&self) -> Result<BTreeMap<TaskName, String>> {
        let path = self.path();
        if !self.fs.exists(&path) {
            return Ok(BTreeMap::new());
        }

        let contents = self
            .fs
            .read_to_string(&path)
            .with_context(|| format!("reading hash file at {:?}", path))?;

        let mut map = BTreeMap::new();
        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            // Hashes never contain whitespace; task names might.
            if let Some((name, hash)) = trimmed.rsplit_once(char::is_whitespace) {
                map.insert(name.trim_end().to_string(), hash.to_string());
            }
        }
        Ok(map)
    }

    fn save_all(&self, map: &BTreeMap<TaskName, String>) -> Result<()> {
        let mut out = String::new();
        for (name, hash) in map {
            out.push_str(name);
            out.push(' ');
            out.push_str(hash);
            out.push('\n');
        }
        let path = self.path();
        self.fs
            .write(&path, out.as_bytes())
            .with_context(|| format!("writing hash file at {:?}", path))
    }
}

impl HashStore for FileHashStore {
    fn load(&self, task: &str) -> Result<Option<String>> {
        Ok(self.load_all()?.get(task).cloned())
    }

    fn save(&mut self, task: &str, hash: &str) -> Result<()> {
        let mut map = self.load_all()?;
        map.insert(task.to_string(), hash.to_string());
        self.save_all(&map)?;
        info!(task = %task, hash = %hash, "stored task hash (file)");
        Ok(())
    }

    fn prune(&mut self, active_tasks: &[&str]) -> Result<()> {
        let mut map = self.load_all()?;
        let initial_len = map.len();
        map.retain(|k, _| active_tasks.contains(&k.as_str()));

        if map.len() < initial_len {
            self.save_all(&map)?;
            info!(
                removed = initial_len - map.len(),
                "pruned stale task hashes (file)"
            );
        }
        Ok(())
    }
}

/// Stores hashes in memory only; every process starts cold.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    map: BTreeMap<TaskName, String>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashStore for MemoryHashStore {
    fn load(&self, task: &str) -> Result<Option<String>> {
        Ok(self.map.get(task).cloned())
    }

    fn save(&mut self, task: &str, hash: &str) -> Result<()> {
        self.map.insert(task.to_string(), hash.to_string());
        info!(task = %task, hash = %hash, "stored task hash (memory)");
        Ok(())
    }

    fn prune(&mut self, active_tasks: &[&str]) -> Result<()> {
        let initial_len = self.map.len();
        self.map.retain(|k, _| active_tasks.contains(&k.as_str()));
        if self.map.len() < initial_len {
            info!(
                removed = initial_len - self.map.len(),
                "pruned stale task hashes (memory)"
            );
        }
        Ok(())
    }
}
