// src/exec/action.rs

//! Task actions: the opaque unit of work a task performs.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::dag::task::TaskNode;

/// Opaque callable run by the action stage.
///
/// The engine's only expectation is "runs to completion or returns an
/// error". Actions may block; they run on a blocking worker thread.
pub trait TaskAction: Send + Sync {
    fn execute(&self, task: &TaskNode) -> Result<()>;
}

/// Adapts a closure into a [`TaskAction`].
pub struct FnAction<F> {
    f: F,
}

impl<F> FnAction<F>
where
    F: Fn(&TaskNode) -> Result<()> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> TaskAction for FnAction<F>
where
    F: Fn(&TaskNode) -> Result<()> + Send + Sync,
{
    fn execute(&self, task: &TaskNode) -> Result<()> {
        (self.f)(task)
    }
}

/// Runs a shell command, failing on a non-zero exit status.
///
/// Output is forwarded line by line while the process runs: stdout at info,
/// stderr at debug, both tagged with the task name.
#[derive(Debug, Clone)]
pub struct ShellAction {
    cmd: String,
    current_dir: Option<PathBuf>,
}

impl ShellAction {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            current_dir: None,
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }
}

/// Build a shell command appropriate for the platform.
pub(crate) fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Emit every line read from `reader` until EOF.
///
/// Bytes are decoded lossily so a stray non-UTF-8 byte does not stop the
/// stream.
fn forward_lines<R: Read>(reader: R, mut emit: impl FnMut(&str)) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                emit(line.trim_end_matches(['\r', '\n']));
            }
        }
    }
}

impl TaskAction for ShellAction {
    fn execute(&self, task: &TaskNode) -> Result<()> {
        info!(task = %task.name, cmd = %self.cmd, "starting task process");

        let mut command = shell_command(&self.cmd);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", task.name))?;

        // Drain stderr on its own thread so neither pipe can fill up and
        // block the child.
        let stderr_reader = child.stderr.take().map(|stderr| {
            let name = task.name.clone();
            thread::spawn(move || {
                forward_lines(stderr, |line| debug!(task = %name, "stderr: {}", line));
            })
        });

        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, |line| info!(task = %task.name, "stdout: {}", line));
        }

        let status = child
            .wait()
            .with_context(|| format!("waiting for process of task '{}'", task.name))?;

        if let Some(handle) = stderr_reader {
            if handle.join().is_err() {
                warn!(task = %task.name, "stderr reader thread panicked");
            }
        }

        let code = status.code().unwrap_or(-1);
        info!(
            task = %task.name,
            exit_code = code,
            success = status.success(),
            "task process exited"
        );

        if !status.success() {
            bail!("command `{}` exited with status {}", self.cmd, code);
        }
        Ok(())
    }
}
