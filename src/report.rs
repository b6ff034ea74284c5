// src/report.rs

//! Human-readable rendering of plans and build results.

use std::fmt::Write;

use crate::dag::ExecutionPlan;
use crate::outcome::{BuildResult, TaskOutcome};

/// Render the final report: failures with their full cause chain, tasks
/// that did not run and why, then the verdict with per-outcome counts.
pub fn render(result: &BuildResult) -> String {
    let mut out = String::new();

    for (i, failure) in result.failures.iter().enumerate() {
        let _ = writeln!(out, "FAILURE {}: task '{}' failed", i + 1, failure.task);
        let _ = writeln!(out, "  cause: {}", failure.error.chain());
    }
    if !result.failures.is_empty() {
        out.push('\n');
    }

    for (name, report) in result.tasks.iter() {
        let line = match report.outcome {
            TaskOutcome::Skipped | TaskOutcome::FailedDependency => format!(
                "{:<18} {} ({})",
                report.outcome.label(),
                name,
                report.reason.as_deref().unwrap_or("no reason recorded")
            ),
            TaskOutcome::NotExecuted if result.aborted => {
                format!("{:<18} {} (build stopped)", report.outcome.label(), name)
            }
            _ => continue,
        };
        out.push_str(&line);
        out.push('\n');
    }

    let c = &result.counts;
    let _ = writeln!(
        out,
        "{}: {} task(s): {} succeeded, {} up-to-date, {} skipped, {} failed, \
         {} failed dependency, {} not executed",
        result.verdict,
        c.total(),
        c.success,
        c.up_to_date,
        c.skipped,
        c.failed,
        c.failed_dependency,
        c.not_executed,
    );
    out
}

/// Render the frozen plan for `--dry-run`.
pub fn render_plan(plan: &ExecutionPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "execution plan for {} ({} task(s)):",
        plan.requested().join(", "),
        plan.len()
    );

    for task in plan.tasks() {
        let marker = if task.requested { "*" } else { " " };
        let _ = write!(out, "{marker} {:>3}. {}", task.id + 1, task.name());
        if let Some(description) = &task.node.description {
            let _ = write!(out, " - {description}");
        }
        out.push('\n');

        let names = |ids: &[usize]| -> Vec<&str> {
            ids.iter().map(|id| plan.task(*id).name()).collect()
        };
        if !task.depends_on.is_empty() {
            let _ = writeln!(
                out,
                "        depends on: {}",
                names(&task.depends_on).join(", ")
            );
        }
        if !task.must_run_after.is_empty() {
            let _ = writeln!(
                out,
                "        runs after: {}",
                names(&task.must_run_after).join(", ")
            );
        }
        if !task.finalizes.is_empty() {
            let _ = writeln!(
                out,
                "        finalizes:  {}",
                names(&task.finalizes).join(", ")
            );
        }
        if !task.node.enabled {
            out.push_str("        (disabled)\n");
        }
    }
    out
}
