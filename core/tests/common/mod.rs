#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use phasegate_core::config::AppConfig;
use phasegate_core::error::{AgentError, RunnerError};
use phasegate_core::record::{ArtifactKind, ExecutionRecord, PhaseStatus, RecordStore};
use phasegate_core::runner::{
    agent_channel, AgentEvent, AgentHandle, AgentOutcome, AgentRequest, ArtifactClaim,
    CommandOutput, CommandRunner, CommandSpec, ExecutionAgent,
};
use phasegate_core::tasks::TaskLayout;
use phasegate_core::{AppContext, Services};
use tempfile::TempDir;

/// A throwaway project root with a `tasks/` directory.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self) -> TaskLayout {
        TaskLayout::new(self.root().join("tasks"))
    }

    pub fn write(&self, rel: &str, body: &str) -> PathBuf {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body).unwrap();
        path
    }

    pub fn task(&self, id: &str, task_md: &str) {
        self.write(&format!("tasks/{id}/task.md"), task_md);
    }

    pub fn legacy_task(&self, id: &str, plan_md: &str, progress_md: &str) {
        self.write(&format!("tasks/{id}/plan.md"), plan_md);
        self.write(&format!("tasks/{id}/progress.md"), progress_md);
    }

    pub fn store(&self, id: &str) -> RecordStore {
        RecordStore::new(self.layout().record_path(id))
    }

    pub fn record(&self, id: &str) -> ExecutionRecord {
        self.store(id).load().unwrap().expect("record exists")
    }

    pub fn save_record(&self, id: &str, record: &mut ExecutionRecord) {
        self.store(id).save(record).unwrap();
    }

    /// Writes the completion declaration and an approving review.
    pub fn approve(&self, id: &str) {
        approve_in(&self.layout(), id);
    }

    pub fn context(
        &self,
        cfg: AppConfig,
        agent: Arc<ScriptedAgent>,
        commands: Arc<FakeCommands>,
    ) -> AppContext {
        let services = Services {
            agent,
            commands,
            retry: None,
        };
        AppContext::new(cfg, self.root(), services).unwrap()
    }
}

pub fn approve_in(layout: &TaskLayout, id: &str) {
    let task_doc = layout.task_doc(id);
    let body = std::fs::read_to_string(&task_doc).unwrap_or_default();
    std::fs::write(&task_doc, format!("**Status:** COMPLETED\n\n{body}")).unwrap();
    std::fs::write(
        layout.review_doc(id),
        "# Review\n\n## Status\nAPPROVED\n",
    )
    .unwrap();
}

/// Default config with an explicit retry ceiling.
pub fn test_config(max_retries: u32) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.scheduler.max_retries = max_retries;
    cfg
}

/// Phase number from a structured prompt's first line (`..., phase N of M: ...`).
pub fn phase_of(prompt: &str) -> u32 {
    let first = prompt.lines().next().unwrap_or("");
    let after = first.split(", phase ").nth(1).unwrap_or("0");
    after
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// What a scripted delegation does, given its zero-based call number.
pub type Script =
    dyn Fn(usize, &AgentRequest) -> Result<Vec<ArtifactClaim>, AgentError> + Send + Sync;

/// Runs a closure in place of a real agent and reports its claims.
pub struct ScriptedAgent {
    script: Box<Script>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    requests: Mutex<Vec<AgentRequest>>,
}

impl ScriptedAgent {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(usize, &AgentRequest) -> Result<Vec<ArtifactClaim>, AgentError>
            + Send
            + Sync
            + 'static,
    {
        Self::with_delay(Duration::ZERO, script)
    }

    pub fn with_delay<F>(delay: Duration, script: F) -> Arc<Self>
    where
        F: Fn(usize, &AgentRequest) -> Result<Vec<ArtifactClaim>, AgentError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            delay,
            calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }

    pub fn task_order(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.task_id.clone())
            .collect()
    }
}

#[async_trait]
impl ExecutionAgent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn delegate(&self, request: AgentRequest) -> Result<AgentHandle, AgentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let (reporter, handle) = agent_channel();
        reporter.emit(AgentEvent::Progress(format!("working on {}", request.task_id)));

        let result = (self.script)(call, &request).map(|claims| AgentOutcome {
            summary: "done".to_string(),
            claims,
            ..Default::default()
        });
        let delay = self.delay;
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
            reporter.finish(result);
        });
        Ok(handle)
    }
}

/// Marks every item of `phase_id` completed, the way an agent edits the record.
pub fn complete_items(store: &RecordStore, phase_id: u32, evidence: &str) {
    let mut record = store.load().unwrap().expect("record exists");
    if let Some(phase) = record.phase_mut(phase_id) {
        for item in &mut phase.items {
            item.status = PhaseStatus::Completed;
            item.evidence = Some(evidence.to_string());
        }
    }
    store.save(&mut record).unwrap();
}

/// Writes a v2 checklist whose entries pass review, one per path.
pub fn write_checklist(path: &Path, files: &[String]) {
    let entries: Vec<serde_json::Value> = files
        .iter()
        .map(|f| {
            serde_json::json!({
                "path": f,
                "justification": "Implements the behaviour required by this phase of the task",
                "references": [format!("{f}:1")],
            })
        })
        .collect();
    let doc = serde_json::json!({ "version": 2, "entries": entries });
    std::fs::write(path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();
}

pub fn created(path: &str) -> ArtifactClaim {
    ArtifactClaim {
        path: path.to_string(),
        kind: ArtifactKind::Created,
    }
}

/// Answers commands by prefix; anything else exits 127.
#[derive(Default)]
pub struct FakeCommands {
    responses: Vec<(String, i32, String)>,
    executed: Mutex<Vec<String>>,
}

impl FakeCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, prefix: &str, exit_code: i32, stdout: &str) -> Self {
        self.responses
            .push((prefix.to_string(), exit_code, stdout.to_string()));
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeCommands {
    fn name(&self) -> &str {
        "fake"
    }

    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        self.executed.lock().unwrap().push(spec.command.clone());
        let found = self
            .responses
            .iter()
            .find(|(prefix, _, _)| spec.command.starts_with(prefix.as_str()));
        Ok(match found {
            Some((_, code, stdout)) => CommandOutput {
                exit_code: Some(*code),
                stdout: stdout.clone(),
                ..Default::default()
            },
            None => CommandOutput {
                exit_code: Some(127),
                stderr: format!("{}: command not found", spec.command),
                ..Default::default()
            },
        })
    }
}
