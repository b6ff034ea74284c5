// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `buildgraph`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildgraph",
    version,
    about = "Run build tasks in dependency order.",
    long_about = None
)]
pub struct CliArgs {
    /// Tasks to build. Defaults to `[config].default_tasks`.
    #[arg(value_name = "TASK")]
    pub tasks: Vec<String>,

    /// Path to the build file (TOML).
    ///
    /// Default: `Buildgraph.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Buildgraph.toml")]
    pub config: String,

    /// Maximum number of tasks executing at once.
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Keep running independent tasks after a failure and report every
    /// failure at the end.
    #[arg(long, conflicts_with = "fail_fast")]
    pub keep_going: bool,

    /// Stop dispatching new tasks after the first failure.
    #[arg(long)]
    pub fail_fast: bool,

    /// Leave a task (and everything only it pulls in) out of the build.
    #[arg(short = 'x', long = "exclude-task", value_name = "NAME")]
    pub exclude_task: Vec<String>,

    /// Ignore up-to-date checks and run every task's action.
    #[arg(long)]
    pub rerun_tasks: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDGRAPH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the execution plan, but don't run any task.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
