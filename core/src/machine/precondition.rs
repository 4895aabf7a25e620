use std::path::Path;
use std::time::Duration;

use crate::error::PreconditionError;
use crate::record::PreCondition;
use crate::runner::{CommandRunner, CommandSpec};
use crate::util::truncate_to;

use super::security::CommandDenylist;

const EVIDENCE_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionVerdict {
    Passed,
    /// A command matched the denylist; nothing was executed.
    Blocked(PreconditionError),
    Failed(Vec<PreconditionError>),
}

/// Runs precondition commands through the command runner after screening them.
pub struct PreconditionVerifier<'a> {
    runner: &'a dyn CommandRunner,
    denylist: &'a CommandDenylist,
    cwd: &'a Path,
    timeout: Duration,
}

impl<'a> PreconditionVerifier<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        denylist: &'a CommandDenylist,
        cwd: &'a Path,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            denylist,
            cwd,
            timeout,
        }
    }

    /// Fills in `passed`/`evidence` on every check.
    ///
    /// All commands are screened before any of them runs, so a denied command
    /// anywhere in the list means no subprocess is started at all.
    pub async fn verify(&self, mut checks: Vec<&mut PreCondition>) -> PreconditionVerdict {
        for check in checks.iter_mut() {
            if let Err(denied) = self.denylist.check(&check.command) {
                tracing::warn!(precondition = %check.name, error = %denied, "precondition command denied");
                check.passed = false;
                check.evidence = denied.to_string();
                return PreconditionVerdict::Blocked(denied);
            }
        }

        let mut failures = Vec::new();
        for check in checks {
            let spec = CommandSpec {
                command: check.command.clone(),
                cwd: self.cwd.to_path_buf(),
                timeout: self.timeout,
            };

            let (passed, evidence) = match self.runner.run(&spec).await {
                Ok(out) if out.timed_out => (
                    false,
                    format!("timed out after {}s", self.timeout.as_secs()),
                ),
                Ok(out) => {
                    let combined = out.combined();
                    let shown = truncate_to(&combined, EVIDENCE_LIMIT);
                    if !out.success() {
                        let code = out
                            .exit_code
                            .map_or_else(|| "signal".to_string(), |c| c.to_string());
                        (false, format!("exit {code}: {shown}"))
                    } else if !check.expected.is_empty()
                        && !combined.contains(check.expected.as_str())
                    {
                        (
                            false,
                            format!("expected '{}' not found in output: {shown}", check.expected),
                        )
                    } else {
                        (true, shown)
                    }
                }
                Err(e) => (false, format!("failed to run: {e}")),
            };

            tracing::debug!(precondition = %check.name, passed, "precondition verified");
            check.passed = passed;
            check.evidence = evidence;
            if !passed {
                failures.push(PreconditionError::Failed {
                    name: check.name.clone(),
                    evidence: check.evidence.clone(),
                });
            }
        }

        if failures.is_empty() {
            PreconditionVerdict::Passed
        } else {
            PreconditionVerdict::Failed(failures)
        }
    }
}
