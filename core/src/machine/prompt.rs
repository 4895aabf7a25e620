//! Delegation prompts. Rendering stays plain text; the agent only needs the
//! planning document, the phase framing and what went wrong last time.

use std::fmt::Write as _;
use std::path::Path;

use crate::record::{Phase, PhaseStatus};

/// Prompt for one phase of a structured task.
pub fn phase_prompt(
    task_id: &str,
    planning_text: &str,
    phase: &Phase,
    total_phases: usize,
    record_path: &Path,
    prior_failures: &[String],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "You are executing task {task_id}, phase {} of {total_phases}: {}.", phase.id, phase.name);
    let _ = writeln!(out, "Work only on this phase. Do not start later phases.");
    out.push('\n');

    if !phase.items.is_empty() {
        let _ = writeln!(out, "## Phase items");
        for item in &phase.items {
            let mark = if item.status == PhaseStatus::Completed { "x" } else { " " };
            let flag = if item.flagged { " (previously claimed but not verified)" } else { "" };
            let _ = writeln!(out, "- [{mark}] {} {}{flag}", item.id, item.description);
        }
        out.push('\n');
    }

    let _ = writeln!(out, "## Execution record");
    let _ = writeln!(
        out,
        "Update {} as you go: mark finished items `completed` with evidence, \
         and list every file you create, modify or delete under `artifacts`.",
        record_path.display()
    );
    out.push('\n');

    push_failures(&mut out, prior_failures);

    let _ = writeln!(out, "## Planning document");
    out.push_str(planning_text.trim_end());
    out.push('\n');
    out
}

/// Prompt for a legacy task; every earlier failure is surfaced, newest last.
pub fn legacy_prompt(
    task_id: &str,
    plan_text: &str,
    progress_path: &Path,
    prior_failures: &[String],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "You are executing task {task_id}.");
    let _ = writeln!(
        out,
        "Tick each checkbox in {} once its step is done.",
        progress_path.display()
    );
    out.push('\n');
    push_failures(&mut out, prior_failures);
    let _ = writeln!(out, "## Plan");
    out.push_str(plan_text.trim_end());
    out.push('\n');
    out
}

fn push_failures(out: &mut String, failures: &[String]) {
    if failures.is_empty() {
        return;
    }
    let _ = writeln!(out, "## Problems from previous attempts");
    for reason in failures {
        let _ = writeln!(out, "- {reason}");
    }
    out.push('\n');
}
