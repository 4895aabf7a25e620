//! Per-task execution state machine for structured (`task.md` + `execution.json`) tasks.

use std::time::Duration;

use async_trait::async_trait;

use crate::context::AppContext;
use crate::error::{AgentError, PipelineError};
use crate::executor::{PipelineRunner, TaskOutcome};
use crate::record::{
    CompletionStatus, ExecutionRecord, PhaseStatus, RecordStatus, RecordStore,
    RemediationCategory, Severity,
};
use crate::runner::{AgentEvent, AgentOutcome, AgentRequest};
use crate::state::TaskRegistry;
use crate::tasks::TaskMode;
use crate::util::{preview, truncate_to};
use crate::validation::{
    check_checklist, check_strategy, seed_record, CheckReport, CriteriaChecker, Reconciler,
    ReviewChecklist,
};

use super::bookkeeping::{normalize_path, record_claims, verify_artifacts};
use super::completion::validate_completion;
use super::gate::PhaseGate;
use super::legacy::LegacyPipeline;
use super::precondition::{PreconditionVerdict, PreconditionVerifier};
use super::prompt::phase_prompt;
use super::recovery::{detect_hallucinations, recover, RecoveryReport};

/// Verdict of one validation pass over a record.
#[derive(Debug, Clone, Default)]
pub struct ValidationVerdict {
    pub complete: bool,
    /// Failure reasons, fed into the next attempt's prompt.
    pub reasons: Vec<String>,
    pub categories: Vec<RemediationCategory>,
    pub warnings: Vec<String>,
    pub recovery: Option<RecoveryReport>,
}

/// Runs one task end to end. Cheap to construct; all state lives in the context.
pub struct TaskPipeline<'a> {
    ctx: &'a AppContext,
}

#[async_trait(?Send)]
impl PipelineRunner for TaskPipeline<'_> {
    #[tracing::instrument(name = "pipeline", skip(self))]
    async fn run_task(&self, task_id: &str) -> Result<TaskOutcome, PipelineError> {
        let registry = self.ctx.registry();
        registry.register(task_id).await;
        registry.start(task_id).await?;

        let result = match self.ctx.layout().mode(task_id) {
            Some(TaskMode::Structured) => self.run_structured(task_id).await,
            Some(TaskMode::Legacy) => LegacyPipeline::new(self.ctx).run(task_id).await,
            None => Err(PipelineError::MissingDefinition(task_id.to_string())),
        };

        // Pipeline errors are recorded by the scheduler.
        match &result {
            Ok(outcome) if outcome.is_success() => {
                registry.complete(task_id, outcome.summary()).await?
            }
            Ok(outcome) => registry.fail(task_id, outcome.summary()).await?,
            Err(_) => {}
        }
        result
    }
}

impl<'a> TaskPipeline<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self { ctx }
    }

    fn store(&self, task_id: &str) -> RecordStore {
        RecordStore::new(self.ctx.layout().record_path(task_id))
    }

    async fn set_phase(&self, task_id: &str, label: impl Into<String>) {
        report_phase(self.ctx.registry(), task_id, label).await;
    }

    async fn run_structured(&self, task_id: &str) -> Result<TaskOutcome, PipelineError> {
        let cfg = self.ctx.cfg();
        let root = self.ctx.project_root();
        let planning_text = std::fs::read_to_string(self.ctx.layout().task_doc(task_id))?;
        let store = self.store(task_id);

        let mut record = match store.load()? {
            Some(record) => record,
            None => {
                let mut record = seed_record(&planning_text);
                store.save(&mut record)?;
                tracing::info!(phases = record.phases.len(), "seeded execution record");
                record
            }
        };

        match record.status {
            RecordStatus::Blocked => {
                return Ok(TaskOutcome::Blocked {
                    reason: "record is blocked; edit it to retry".to_string(),
                })
            }
            RecordStatus::Completed => {
                if detect_hallucinations(&record, root).is_empty() {
                    return Ok(TaskOutcome::AlreadyCompleted);
                }
                tracing::warn!("completed record has missing artifacts, resuming");
            }
            RecordStatus::Pending | RecordStatus::InProgress => {}
        }

        if record.status == RecordStatus::Pending {
            record.status = RecordStatus::InProgress;
        }
        if let Some(outcome) = self.verify_preconditions(task_id, &store, &mut record).await? {
            return Ok(outcome);
        }

        let attempts = cfg.scheduler.max_attempts();
        let mut failures: Vec<String> = Vec::new();
        let mut verdict = ValidationVerdict::default();

        for attempt in 1..=attempts {
            if attempt > 1 {
                self.pause_before(attempt, &failures).await;
            }
            match self
                .run_phases(task_id, &planning_text, &store, &mut record, attempt, &failures)
                .await
            {
                Ok(()) => {}
                Err(e @ PipelineError::Agent { .. }) => {
                    let message = e.to_string();
                    let fatal = self
                        .ctx
                        .services()
                        .retry
                        .as_ref()
                        .is_some_and(|s| s.is_fatal_error(&message));
                    if attempt == attempts || fatal {
                        return Err(e);
                    }
                    tracing::warn!(attempt, error = %message, "agent failed, retrying");
                    failures = vec![message];
                    continue;
                }
                Err(e) => return Err(e),
            }

            self.set_phase(task_id, "validation").await;
            verdict = self.evaluate(task_id, &planning_text, &mut record).await;
            store.save(&mut record)?;

            if verdict.complete {
                tracing::info!(attempt, "task completed");
                return Ok(TaskOutcome::Completed);
            }
            tracing::info!(attempt, reasons = verdict.reasons.len(), "task incomplete");
            failures = verdict.reasons.clone();
        }

        Ok(TaskOutcome::Incomplete {
            reasons: verdict.reasons,
            remediation: verdict.categories,
        })
    }

    /// `Some(outcome)` when the run must stop here.
    async fn verify_preconditions(
        &self,
        task_id: &str,
        store: &RecordStore,
        record: &mut ExecutionRecord,
    ) -> Result<Option<TaskOutcome>, PipelineError> {
        if record.phases.iter().all(|p| p.preconditions.is_empty()) {
            store.save(record)?;
            return Ok(None);
        }
        self.set_phase(task_id, "preconditions").await;

        let verifier = PreconditionVerifier::new(
            self.ctx.services().commands.as_ref(),
            self.ctx.denylist(),
            self.ctx.project_root(),
            Duration::from_secs(self.ctx.cfg().preconditions.timeout_secs),
        );
        let outcome = match verifier.verify(record.preconditions_mut()).await {
            PreconditionVerdict::Passed => None,
            PreconditionVerdict::Blocked(denied) => {
                record.status = RecordStatus::Blocked;
                record.push_error(Severity::Critical, None, denied.to_string(), None);
                Some(TaskOutcome::Blocked {
                    reason: denied.to_string(),
                })
            }
            PreconditionVerdict::Failed(errors) => {
                let failures: Vec<String> = errors.iter().map(ToString::to_string).collect();
                record.push_error(
                    Severity::Warning,
                    None,
                    format!("{} precondition(s) failed", failures.len()),
                    None,
                );
                Some(TaskOutcome::PreconditionsFailed { failures })
            }
        };
        store.save(record)?;
        Ok(outcome)
    }

    async fn pause_before(&self, attempt: u32, failures: &[String]) {
        let Some(strategy) = &self.ctx.services().retry else {
            return;
        };
        let last = failures.last().map(String::as_str).unwrap_or("");
        if let Some(delay) = strategy.next_delay(attempt - 1, last) {
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, strategy = strategy.name(), "waiting before retry");
            tokio::time::sleep(delay).await;
        }
    }

    /// Runs every not-yet-completed phase in order until one does not complete.
    async fn run_phases(
        &self,
        task_id: &str,
        planning_text: &str,
        store: &RecordStore,
        record: &mut ExecutionRecord,
        attempt: u32,
        failures: &[String],
    ) -> Result<(), PipelineError> {
        let root = self.ctx.project_root();
        PhaseGate::enforce(record);

        let pending: Vec<u32> = record
            .phases
            .iter()
            .filter(|p| p.status != PhaseStatus::Completed)
            .map(|p| p.id)
            .collect();

        for phase_id in pending {
            if record.phase(phase_id).map(|p| p.status) == Some(PhaseStatus::Completed) {
                continue;
            }
            if let Err(e) = PhaseGate::transition(record, phase_id, PhaseStatus::InProgress) {
                tracing::debug!(phase = phase_id, error = %e, "phase gate closed");
                break;
            }
            store.save(record)?;

            let Some(phase) = record.phase(phase_id).cloned() else {
                break;
            };
            self.set_phase(task_id, format!("phase {}: {}", phase.id, phase.name))
                .await;
            let prompt = phase_prompt(
                task_id,
                planning_text,
                &phase,
                record.phases.len(),
                store.path(),
                failures,
            );

            let outcome = match delegate(self.ctx, task_id, prompt).await {
                Ok(outcome) => outcome,
                Err(source) => {
                    // Keep whatever the agent managed to write before failing.
                    if let Some(reloaded) = store.load()? {
                        *record = reloaded;
                    }
                    let trace = source
                        .trace()
                        .map(|t| truncate_to(t, self.ctx.cfg().validation.trace_limit));
                    record.push_error(
                        Severity::Error,
                        Some(phase_id),
                        format!("attempt {attempt}: agent failed: {source}"),
                        trace,
                    );
                    store.save(record)?;
                    return Err(PipelineError::Agent {
                        task_id: task_id.to_string(),
                        source,
                    });
                }
            };

            if let Some(reloaded) = store.load()? {
                *record = reloaded;
            }
            let added = record_claims(record, &outcome.claims, root);
            PhaseGate::enforce(record);
            verify_artifacts(record, root);

            let items_done = record.phase(phase_id).is_some_and(|p| {
                p.status != PhaseStatus::Pending
                    && p.items.iter().all(|i| i.status == PhaseStatus::Completed)
            });
            if items_done {
                PhaseGate::transition(record, phase_id, PhaseStatus::Completed)?;
            }
            store.save(record)?;
            tracing::info!(phase = phase_id, attempt, claims = added, completed = items_done, "phase delegated");

            if !items_done {
                break;
            }
        }
        Ok(())
    }

    /// Runs every checker plus completion validation and hallucination recovery.
    /// Mutates only the in-memory record; the caller persists it.
    pub async fn evaluate(
        &self,
        task_id: &str,
        planning_text: &str,
        record: &mut ExecutionRecord,
    ) -> ValidationVerdict {
        let cfg = self.ctx.cfg();
        let root = self.ctx.project_root();
        let commands = self.ctx.services().commands.as_ref();
        verify_artifacts(record, root);

        let mut reports: Vec<CheckReport> = vec![check_strategy(planning_text, record)];

        if cfg.validation.run_success_criteria {
            let checker = CriteriaChecker {
                runner: commands,
                denylist: self.ctx.denylist(),
                cwd: root,
                timeout: Duration::from_secs(cfg.validation.criteria_timeout_secs),
            };
            let outcome = checker.check(planning_text).await;
            record.success_criteria = outcome.results;
            reports.push(outcome.report);
        }

        reports.push(
            match ReviewChecklist::load(&self.ctx.layout().checklist_path(task_id)) {
                Ok(list) => check_checklist(list.as_ref(), record, root),
                Err(e) => {
                    let mut report = CheckReport::new("review-checklist");
                    report.fail(RemediationCategory::UnmetChecklistItems, e.to_string());
                    report
                }
            },
        );

        let reconciler = Reconciler {
            runner: commands,
            root,
            timeout: Duration::from_secs(cfg.preconditions.timeout_secs),
        };
        let tasks_prefix = format!(
            "{}/",
            normalize_path(&self.ctx.layout().root().to_string_lossy(), root)
        );
        let reconciled = reconciler.run(record, &[tasks_prefix]).await;
        if reconciled.available {
            for path in &reconciled.undeclared {
                record.push_uncertainty("undeclared change", path.clone());
            }
            for path in &reconciled.unchanged {
                record.push_uncertainty("declared artifact unchanged", path.clone());
            }
            reports.push(reconciled.to_check(cfg.validation.strict_reconciliation));
        }

        let completion = validate_completion(record);
        let mut verdict = ValidationVerdict {
            complete: completion.is_complete(),
            reasons: completion.reasons.iter().map(ToString::to_string).collect(),
            categories: completion.categories(),
            ..Default::default()
        };
        for report in &reports {
            for issue in &report.failures {
                verdict.complete = false;
                verdict.reasons.push(format!("{}: {}", report.checker, issue.message));
                verdict.categories.push(issue.category);
            }
            for issue in &report.warnings {
                tracing::info!(checker = report.checker, warning = %issue.message, "validation warning");
                verdict.warnings.push(format!("{}: {}", report.checker, issue.message));
            }
        }

        let missing = detect_hallucinations(record, root);
        if !missing.is_empty() {
            verdict.complete = false;
            verdict.reasons.push(format!(
                "declared but missing on disk: {}",
                missing.join(", ")
            ));
            verdict.categories.push(RemediationCategory::Hallucination);
            verdict.recovery = Some(recover(record, &missing));
        }
        verdict.categories.sort();
        verdict.categories.dedup();

        if verdict.complete {
            record.status = RecordStatus::Completed;
            record.completion.status = CompletionStatus::Completed;
            record.completion.pending_remediation.clear();
            record.completion.reasons.clear();
        } else {
            record.status = RecordStatus::InProgress;
            if verdict.recovery.is_none() {
                record.completion.status = CompletionStatus::PendingValidation;
            }
            record.completion.pending_remediation = verdict.categories.clone();
            record.completion.reasons = verdict.reasons.clone();
        }
        verdict
    }

    /// Validation without delegation: loads the record, evaluates a copy, saves nothing.
    pub async fn check(
        &self,
        task_id: &str,
    ) -> Result<(ExecutionRecord, ValidationVerdict), PipelineError> {
        match self.ctx.layout().mode(task_id) {
            Some(TaskMode::Structured) => {
                let planning_text =
                    std::fs::read_to_string(self.ctx.layout().task_doc(task_id))?;
                let mut record = self
                    .store(task_id)
                    .load()?
                    .unwrap_or_else(|| seed_record(&planning_text));
                let verdict = self.evaluate(task_id, &planning_text, &mut record).await;
                Ok((record, verdict))
            }
            Some(TaskMode::Legacy) => {
                let verdict = LegacyPipeline::new(self.ctx).evaluate(task_id).await?;
                Ok((ExecutionRecord::seeded(Vec::new()), verdict))
            }
            None => Err(PipelineError::MissingDefinition(task_id.to_string())),
        }
    }
}

/// Publishes a phase label; a registry refusal is logged, never fatal to the pipeline.
pub(super) async fn report_phase(
    registry: &TaskRegistry,
    task_id: &str,
    label: impl Into<String>,
) -> bool {
    match registry.set_phase(task_id, label).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(task_id, error = %e, "registry phase update failed");
            false
        }
    }
}

/// Hands one prompt to the execution agent and waits for its terminal result,
/// relaying progress events into the registry meanwhile.
pub(super) async fn delegate(
    ctx: &AppContext,
    task_id: &str,
    prompt: String,
) -> Result<AgentOutcome, AgentError> {
    let agent = ctx.services().agent.clone();
    let request = AgentRequest {
        task_id: task_id.to_string(),
        prompt,
        workdir: Some(ctx.project_root().to_path_buf()),
    };
    tracing::debug!(agent = agent.name(), "delegating");
    let mut handle = agent.delegate(request).await?;
    let events = handle.take_events();

    let relay = async {
        let Some(mut rx) = events else {
            return;
        };
        while let Some(event) = rx.recv().await {
            observe(ctx, task_id, event).await;
        }
    };
    let (_, result) = futures::join!(relay, handle.outcome());
    result
}

async fn observe(ctx: &AppContext, task_id: &str, event: AgentEvent) {
    let registry = ctx.registry();
    let quiet = registry.display_attached();
    let message = match &event {
        AgentEvent::Progress(text) => preview(text),
        AgentEvent::ToolInvocation { tool, summary } => format!("{tool}: {}", preview(summary)),
        AgentEvent::Finished {
            success,
            duration_ms,
            cost_usd,
            ..
        } => {
            tracing::info!(success, duration_ms = ?duration_ms, cost_usd = ?cost_usd, "agent finished");
            return;
        }
    };
    if quiet {
        tracing::trace!(event = %message, "agent event");
    } else {
        tracing::debug!(event = %message, "agent event");
    }
    if !message.is_empty() {
        if let Err(e) = registry.set_message(task_id, message).await {
            tracing::warn!(error = %e, "registry message update failed");
        }
    }
}
