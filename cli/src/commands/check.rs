use phasegate_core::error::CliError;
use phasegate_core::machine::TaskPipeline;
use phasegate_core::AppContext;
use serde_json::json;

use super::cli::CheckArgs;
use super::status::wire_name;
use super::{resolve_task, EXIT_OK, EXIT_TASKS_FAILED};

/// Runs the validation subsystem against the task's current files; nothing is saved.
pub async fn check(args: CheckArgs, ctx: &AppContext) -> Result<i32, CliError> {
    let cfg = ctx.cfg();
    let roster: Vec<String> = ctx
        .layout()
        .roster(&cfg.tasks.roster)?
        .into_iter()
        .map(|d| d.id)
        .collect();
    let task_id = resolve_task(&args.task, &roster);

    let (record, verdict) = TaskPipeline::new(ctx).check(&task_id).await?;
    let categories: Vec<String> = verdict.categories.iter().map(wire_name).collect();

    if args.json {
        let doc = json!({
            "task": task_id,
            "complete": verdict.complete,
            "reasons": verdict.reasons,
            "remediation": categories,
            "warnings": verdict.warnings,
            "missingArtifacts": verdict.recovery.as_ref().map(|r| r.missing.clone()),
            "record": record,
        });
        println!("{}", serde_json::to_string_pretty(&doc).map_err(anyhow::Error::from)?);
    } else {
        let state = if verdict.complete { "complete" } else { "incomplete" };
        println!("{task_id}: {state}");
        for reason in &verdict.reasons {
            println!("  - {reason}");
        }
        for warning in &verdict.warnings {
            println!("  ! {warning}");
        }
        if !categories.is_empty() {
            println!("  remediation: {}", categories.join(", "));
        }
        if let Some(recovery) = &verdict.recovery {
            println!(
                "  would roll back phases {:?}; missing: {}",
                recovery.reverted_phases,
                recovery.missing.join(", ")
            );
        }
    }

    Ok(if verdict.complete {
        EXIT_OK
    } else {
        EXIT_TASKS_FAILED
    })
}
