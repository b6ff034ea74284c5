// src/dag/mod.rs

//! Task graph representation and scheduling.
//!
//! - [`task`] holds task declarations ([`TaskNode`], [`TaskSet`]).
//! - [`graph`] is a petgraph-backed DAG with cycle detection and
//!   deterministic topological ordering.
//! - [`plan`] freezes a declared task set into an immutable
//!   [`ExecutionPlan`] for the requested entry tasks.
//! - [`scheduler`] contains the per-build state machine that decides which
//!   tasks are ready, and resolves dependents on completion.
//! - [`state_manager`] owns the write-once outcome slots.
//! - [`scheduler_step`] defines values exchanged with the runtime.

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

pub mod graph;
pub mod plan;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task;

pub use graph::{DagGraph, EdgeKind};
pub use plan::{ExecutionPlan, FreezeOptions, PlannedTask, TaskId, freeze, freeze_with};
pub use scheduler::Scheduler;
pub use scheduler_step::{ScheduledTask, SchedulerStep};
pub use task::{TaskNode, TaskNodeBuilder, TaskSet};
