// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`action`] and [`predicate`] define what a task does and whether it
//!   should run at all.
//! - [`pipeline`] is the stage chain every claimed task passes through, and
//!   [`stages`] holds the built-in stages.
//! - [`up_to_date`] and [`fingerprint`] decide whether previous outputs are
//!   still valid.
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `PipelineBackend`, which tests can replace with a fake implementation.

pub mod action;
pub mod backend;
pub mod fingerprint;
pub mod pipeline;
pub mod predicate;
pub mod stages;
pub mod up_to_date;

pub use action::{FnAction, ShellAction, TaskAction};
pub use backend::{ExecutorBackend, PipelineBackend};
pub use fingerprint::{FileHashStore, HashStore, MemoryHashStore};
pub use pipeline::{Next, Pipeline, Stage};
pub use predicate::{CommandPredicate, EnvPredicate, FnPredicate, TaskPredicate};
pub use stages::{ActionStage, GatingStage, OutputCaptureStage, UpToDateStage};
pub use up_to_date::{FingerprintUpToDate, NeverUpToDate, UpToDateCheck};
