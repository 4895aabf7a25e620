use phasegate_core::config::AppConfig;
use phasegate_core::error::CliError;
use phasegate_core::executor::{DependencyGraph, Scheduler, SchedulerOpts, SchedulerReport};
use phasegate_core::machine::TaskPipeline;
use phasegate_core::AppContext;
use phasegate_plugins::build_approval_probe;
use tokio::sync::oneshot;
use tracing::Instrument;

use super::cli::RunArgs;
use super::{resolve_task, EXIT_INTERRUPTED, EXIT_OK};
use crate::display::{self, ProgressMonitor};

/// Flags win over file and environment config.
pub fn apply_overrides(cfg: &mut AppConfig, args: &RunArgs) {
    if let Some(limit) = args.concurrency {
        cfg.scheduler.concurrency = limit;
    }
    if let Some(retries) = args.max_retries {
        cfg.scheduler.max_retries = retries;
    }
    if args.no_display {
        cfg.display.enabled = false;
    }
}

pub async fn run(args: RunArgs, ctx: &AppContext) -> Result<i32, CliError> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("run", run_id = %run_id);
    run_inner(args, ctx).instrument(span).await
}

async fn run_inner(args: RunArgs, ctx: &AppContext) -> Result<i32, CliError> {
    let cfg = ctx.cfg();
    let defs = ctx.layout().roster(&cfg.tasks.roster)?;
    let graph = DependencyGraph::build(&defs, cfg.graph.unknown_dependencies)?;

    let only = (!args.tasks.is_empty()).then(|| {
        args.tasks
            .iter()
            .map(|t| resolve_task(t, graph.order()))
            .collect::<Vec<_>>()
    });
    let opts = SchedulerOpts {
        concurrency: cfg.scheduler.concurrency,
        only,
    };
    tracing::info!(
        tasks = graph.len(),
        concurrency = %opts.concurrency,
        max_attempts = cfg.scheduler.max_attempts(),
        "starting run"
    );

    let probe = build_approval_probe(cfg, ctx.layout());
    let pipeline = TaskPipeline::new(ctx);
    let scheduler = Scheduler::new(&graph, ctx.registry().clone(), opts);
    let show_display = cfg.display.enabled && atty::is(atty::Stream::Stderr);

    let work = async {
        if !show_display {
            return scheduler.run(&pipeline, probe.as_ref()).await;
        }
        let attachment = ctx.registry().attach_display();
        let (stop_tx, stop_rx) = oneshot::channel();
        let scheduled = async {
            let result = scheduler.run(&pipeline, probe.as_ref()).await;
            let _ = stop_tx.send(result.as_ref().is_ok_and(SchedulerReport::is_success));
            result
        };
        let (result, ()) = tokio::join!(
            scheduled,
            display::drive(attachment, ProgressMonitor::new(), stop_rx)
        );
        result
    };

    let report = tokio::select! {
        result = work => result?,
        _ = tokio::signal::ctrl_c() => {
            // Dropping the in-flight pipelines kills their agents; records
            // were saved after every step, so the next run resumes.
            tracing::warn!("interrupted, stopping in-flight tasks");
            return Ok(EXIT_INTERRUPTED);
        }
    };

    print_report(&report);
    if report.is_success() {
        Ok(EXIT_OK)
    } else {
        Err(CliError::TasksFailed {
            failed: report.failed.len() + report.stalled(),
        })
    }
}

fn print_report(report: &SchedulerReport) {
    println!(
        "run finished in {:.1}s: {} completed, {} failed, {} stalled",
        report.duration_ms as f64 / 1000.0,
        report.completed.len(),
        report.failed.len(),
        report.stalled()
    );
    for id in &report.completed {
        println!("  ✅ {id}");
    }
    for (id, reason) in &report.failed {
        println!("  ❌ {id}: {reason}");
    }
    for (id, blocked) in &report.blocked {
        let mut waits = Vec::new();
        if !blocked.unapproved.is_empty() {
            waits.push(format!("waiting on {}", blocked.unapproved.join(", ")));
        }
        if !blocked.unresolved.is_empty() {
            waits.push(format!("unknown dependencies {}", blocked.unresolved.join(", ")));
        }
        println!("  ⏸  {id}: {}", waits.join("; "));
    }
    for cycle in &report.cycles {
        println!("  cycle: {}", cycle.join(" -> "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasegate_core::executor::ConcurrencyLimit;

    #[test]
    fn flags_override_config() {
        let mut cfg = AppConfig::default();
        apply_overrides(
            &mut cfg,
            &RunArgs {
                concurrency: Some(ConcurrencyLimit::bounded(1)),
                max_retries: Some(0),
                tasks: Vec::new(),
                no_display: true,
            },
        );
        assert_eq!(cfg.scheduler.concurrency, ConcurrencyLimit::bounded(1));
        assert_eq!(cfg.scheduler.max_attempts(), 1);
        assert!(!cfg.display.enabled);
    }

    #[test]
    fn absent_flags_keep_config() {
        let mut cfg = AppConfig::default();
        apply_overrides(&mut cfg, &RunArgs::default());
        assert_eq!(cfg.scheduler.concurrency, ConcurrencyLimit::default());
        assert_eq!(cfg.scheduler.max_retries, 2);
        assert!(cfg.display.enabled);
    }
}
