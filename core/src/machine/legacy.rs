//! Legacy tasks: `plan.md` plus a `progress.md` checkbox list, no phases.
//!
//! Same precondition and completion rules as structured tasks, but retried
//! with escalating context instead of being gated phase by phase.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::context::AppContext;
use crate::error::PipelineError;
use crate::executor::TaskOutcome;
use crate::record::{PreCondition, RemediationCategory};
use crate::validation::markdown::{checkboxes, section_by_heading, section_by_label};
use crate::validation::CriteriaChecker;

use super::pipeline::{delegate, report_phase, ValidationVerdict};
use super::precondition::{PreconditionVerdict, PreconditionVerifier};
use super::prompt::legacy_prompt;

fn precondition_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*(?:[-*]|\d+\.)\s+(?:\[[ xX]\]\s+)?(?:(?P<name>[^`]*?)\s*[:\-–]?\s*)?`(?P<cmd>[^`]+)`(?:.*?\bexpect(?:s|ed)?\b\s*[:=]?\s*"(?P<expected>[^"]*)")?"#)
            .expect("valid precondition pattern")
    })
}

/// Preconditions declared in the plan's `Preconditions` section.
pub fn parse_preconditions(plan_text: &str) -> Vec<PreCondition> {
    let section = section_by_heading(plan_text, "preconditions")
        .or_else(|| section_by_label(plan_text, "preconditions", true))
        .or_else(|| section_by_label(plan_text, "preconditions", false));
    let Some(section) = section else {
        return Vec::new();
    };

    section
        .lines()
        .filter_map(|line| {
            let caps = precondition_line_re().captures(line)?;
            let command = caps.name("cmd")?.as_str().trim().to_string();
            let name = caps
                .name("name")
                .map(|m| m.as_str().trim().trim_end_matches(':').trim())
                .filter(|n| !n.is_empty())
                .map_or_else(|| command.clone(), str::to_string);
            let expected = caps
                .name("expected")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            Some(PreCondition {
                name,
                command,
                expected,
                passed: false,
                evidence: String::new(),
            })
        })
        .collect()
}

/// Unticked checkbox lines; an empty list of checkboxes counts as unticked.
pub fn unticked_steps(progress_text: &str) -> Vec<String> {
    let boxes = checkboxes(progress_text);
    if boxes.is_empty() {
        return vec!["progress list has no checkboxes".to_string()];
    }
    boxes
        .into_iter()
        .filter(|(done, _)| !done)
        .map(|(_, step)| step)
        .collect()
}

pub struct LegacyPipeline<'a> {
    ctx: &'a AppContext,
}

impl<'a> LegacyPipeline<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, task_id: &str) -> Result<TaskOutcome, PipelineError> {
        let cfg = self.ctx.cfg();
        let layout = self.ctx.layout();
        let plan_text = std::fs::read_to_string(layout.legacy_plan(task_id))?;
        let registry = self.ctx.registry();

        let mut preconditions = parse_preconditions(&plan_text);
        if !preconditions.is_empty() {
            report_phase(registry, task_id, "preconditions").await;
            let verifier = PreconditionVerifier::new(
                self.ctx.services().commands.as_ref(),
                self.ctx.denylist(),
                self.ctx.project_root(),
                Duration::from_secs(cfg.preconditions.timeout_secs),
            );
            match verifier.verify(preconditions.iter_mut().collect()).await {
                PreconditionVerdict::Passed => {}
                PreconditionVerdict::Blocked(denied) => {
                    return Ok(TaskOutcome::Blocked {
                        reason: denied.to_string(),
                    })
                }
                PreconditionVerdict::Failed(errors) => {
                    return Ok(TaskOutcome::PreconditionsFailed {
                        failures: errors.iter().map(ToString::to_string).collect(),
                    })
                }
            }
        }

        let attempts = cfg.scheduler.max_attempts();
        let mut history: Vec<String> = Vec::new();
        let mut verdict = ValidationVerdict::default();

        for attempt in 1..=attempts {
            report_phase(registry, task_id, format!("attempt {attempt}/{attempts}")).await;
            if attempt > 1 {
                if let Some(strategy) = &self.ctx.services().retry {
                    let last = history.last().map(String::as_str).unwrap_or("");
                    if let Some(delay) = strategy.next_delay(attempt - 1, last) {
                        tokio::time::sleep(delay).await;
                    }
                }
            }

            let prompt = legacy_prompt(
                task_id,
                &plan_text,
                &layout.legacy_progress(task_id),
                &history,
            );
            if let Err(source) = delegate(self.ctx, task_id, prompt).await {
                let message = format!("attempt {attempt}: agent failed: {source}");
                let fatal = self
                    .ctx
                    .services()
                    .retry
                    .as_ref()
                    .is_some_and(|s| s.is_fatal_error(&message));
                if attempt == attempts || fatal {
                    return Err(PipelineError::Agent {
                        task_id: task_id.to_string(),
                        source,
                    });
                }
                tracing::warn!(attempt, error = %source, "agent failed, retrying");
                history.push(message);
                continue;
            }

            report_phase(registry, task_id, "validation").await;
            verdict = self.evaluate(task_id).await?;
            if verdict.complete {
                tracing::info!(attempt, "legacy task completed");
                return Ok(TaskOutcome::Completed);
            }
            history.extend(
                verdict
                    .reasons
                    .iter()
                    .map(|r| format!("attempt {attempt}: {r}")),
            );
        }

        Ok(TaskOutcome::Incomplete {
            reasons: verdict.reasons,
            remediation: verdict.categories,
        })
    }

    /// Progress checkboxes plus automatic success criteria from the plan.
    pub async fn evaluate(&self, task_id: &str) -> Result<ValidationVerdict, PipelineError> {
        let cfg = self.ctx.cfg();
        let layout = self.ctx.layout();
        let plan_text = std::fs::read_to_string(layout.legacy_plan(task_id))?;
        let progress_text = match std::fs::read_to_string(layout.legacy_progress(task_id)) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut verdict = ValidationVerdict::default();
        let unticked = unticked_steps(&progress_text);
        if !unticked.is_empty() {
            verdict.categories.push(RemediationCategory::IncompleteItems);
            verdict
                .reasons
                .extend(unticked.iter().map(|s| format!("step not ticked: {s}")));
        }

        if cfg.validation.run_success_criteria {
            let checker = CriteriaChecker {
                runner: self.ctx.services().commands.as_ref(),
                denylist: self.ctx.denylist(),
                cwd: self.ctx.project_root(),
                timeout: Duration::from_secs(cfg.validation.criteria_timeout_secs),
            };
            let outcome = checker.check(&plan_text).await;
            for issue in outcome.report.failures {
                verdict.categories.push(issue.category);
                verdict.reasons.push(issue.message);
            }
        }

        verdict.categories.sort();
        verdict.categories.dedup();
        verdict.complete = verdict.reasons.is_empty();
        Ok(verdict)
    }
}
