pub mod check;
pub mod cli;
pub mod graph;
pub mod run;
pub mod status;

use phasegate_core::error::{CliError, PipelineError, SchedulerError};
use phasegate_core::tasks::resolve_token;

pub const EXIT_OK: i32 = 0;
pub const EXIT_TASKS_FAILED: i32 = 30;
pub const EXIT_INTERRUPTED: i32 = 130;

pub fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 11: config error
    // 12: graph / structural error (missing definitions, invalid records)
    // 20: runner start / IO error
    // 30: tasks failed or stalled
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Graph(_) => 12,
        CliError::Scheduler(se) => match se {
            SchedulerError::UnknownTask(_) => 12,
            SchedulerError::Registry(_) => 50,
        },
        CliError::Pipeline(pe) => match pe {
            PipelineError::MissingDefinition(_)
            | PipelineError::Record(_)
            | PipelineError::Gate(_) => 12,
            PipelineError::Agent { .. } | PipelineError::Io(_) => 20,
            PipelineError::Registry(_) => 50,
        },
        CliError::TasksFailed { .. } => EXIT_TASKS_FAILED,
        CliError::Io(_) => 20,
        CliError::Anyhow(_) => 50,
    }
}

/// Maps a user-supplied task token onto a roster id. Bare numbers match the
/// numeric suffix (`3` -> `TASK3`); anything else matches case-insensitively.
pub fn resolve_task(token: &str, roster: &[String]) -> String {
    let token = token.trim();
    if let Ok(n) = token.parse::<u64>() {
        let by_number = roster.iter().find(|id| {
            id.trim_start_matches(|c: char| !c.is_ascii_digit())
                .parse::<u64>()
                .is_ok_and(|m| m == n)
        });
        if let Some(id) = by_number {
            return id.clone();
        }
    }
    resolve_token(token, roster)
}
