use phasegate_core::error::CliError;
use phasegate_core::machine::unticked_steps;
use phasegate_core::record::{ExecutionRecord, PhaseStatus, RecordStore};
use phasegate_core::tasks::{TaskDefinition, TaskMode};
use phasegate_core::AppContext;
use phasegate_plugins::build_approval_probe;
use serde::Serialize;
use serde_json::{json, Value};

use super::cli::OutputArgs;
use super::EXIT_OK;

/// Snake-case wire name of a persisted enum, as it appears in the record.
pub fn wire_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        _ => "unknown".to_string(),
    }
}

/// One status line's worth of facts about a task.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: String,
    pub mode: &'static str,
    pub approved: bool,
    pub record: String,
    pub progress: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remediation: Vec<String>,
}

pub fn summarize_record(record: &ExecutionRecord) -> (String, String, Vec<String>) {
    let done = record
        .phases
        .iter()
        .filter(|p| p.status == PhaseStatus::Completed)
        .count();
    let current = record
        .phases
        .iter()
        .find(|p| p.status != PhaseStatus::Completed)
        .map(|p| format!(", next: {} {}", p.id, p.name))
        .unwrap_or_default();
    (
        wire_name(&record.status),
        format!("{done}/{} phases{current}", record.phases.len()),
        record
            .completion
            .pending_remediation
            .iter()
            .map(wire_name)
            .collect(),
    )
}

fn summarize(ctx: &AppContext, def: &TaskDefinition, approved: bool) -> TaskSummary {
    let layout = ctx.layout();
    let (mode, (record, progress, remediation)) = match def.mode {
        TaskMode::Structured => {
            let facts = match RecordStore::new(layout.record_path(&def.id)).load() {
                Ok(Some(record)) => summarize_record(&record),
                Ok(None) => ("none".to_string(), "not started".to_string(), Vec::new()),
                Err(e) => ("invalid".to_string(), e.to_string(), Vec::new()),
            };
            ("structured", facts)
        }
        TaskMode::Legacy => {
            let progress = std::fs::read_to_string(layout.legacy_progress(&def.id))
                .map(|text| format!("{} step(s) unticked", unticked_steps(&text).len()))
                .unwrap_or_else(|_| "no progress file".to_string());
            ("legacy", ("-".to_string(), progress, Vec::new()))
        }
    };
    TaskSummary {
        id: def.id.clone(),
        mode,
        approved,
        record,
        progress,
        remediation,
    }
}

pub fn status(args: OutputArgs, ctx: &AppContext) -> Result<i32, CliError> {
    let cfg = ctx.cfg();
    let defs = ctx.layout().roster(&cfg.tasks.roster)?;
    let probe = build_approval_probe(cfg, ctx.layout());
    let summaries: Vec<TaskSummary> = defs
        .iter()
        .map(|def| summarize(ctx, def, probe.is_approved(&def.id)))
        .collect();

    if args.json {
        let doc = json!({ "tasks": summaries });
        println!("{}", serde_json::to_string_pretty(&doc).map_err(anyhow::Error::from)?);
        return Ok(EXIT_OK);
    }

    for s in &summaries {
        let approval = if s.approved { "approved" } else { "pending" };
        println!(
            "{:<12} {:<10} {:<9} record={:<12} {}",
            s.id, s.mode, approval, s.record, s.progress
        );
        if !s.remediation.is_empty() {
            println!("{:<12} remediation: {}", "", s.remediation.join(", "));
        }
    }
    Ok(EXIT_OK)
}
