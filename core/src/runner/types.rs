use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::error::AgentError;
use crate::record::ArtifactKind;

/// One delegation to an execution agent.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub task_id: String,
    pub prompt: String,
    /// Working directory override; the agent's default otherwise.
    pub workdir: Option<PathBuf>,
}

/// Discrete progress emitted while an agent runs. Advisory only.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Progress(String),
    ToolInvocation {
        tool: String,
        summary: String,
    },
    Finished {
        success: bool,
        duration_ms: Option<u64>,
        cost_usd: Option<f64>,
        summary: String,
    },
}

/// A file the agent says it touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactClaim {
    pub path: String,
    pub kind: ArtifactKind,
}

/// Terminal success of a delegation.
#[derive(Debug, Clone, Default)]
pub struct AgentOutcome {
    pub summary: String,
    pub duration_ms: Option<u64>,
    pub cost_usd: Option<f64>,
    pub claims: Vec<ArtifactClaim>,
}

type AgentResult = Result<AgentOutcome, AgentError>;

/// Consumer side of a running delegation: a finite event sequence plus one terminal result.
pub struct AgentHandle {
    events: Option<mpsc::UnboundedReceiver<AgentEvent>>,
    result: oneshot::Receiver<AgentResult>,
}

impl AgentHandle {
    /// The event sequence can be taken once; later calls return `None`.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<AgentEvent>> {
        self.events.take()
    }

    pub async fn outcome(self) -> AgentResult {
        self.result.await.unwrap_or(Err(AgentError::Disconnected))
    }
}

/// Producer side, owned by the agent implementation.
pub struct AgentReporter {
    events: mpsc::UnboundedSender<AgentEvent>,
    result: oneshot::Sender<AgentResult>,
}

impl AgentReporter {
    pub fn emit(&self, event: AgentEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Publishes the terminal result and closes the event sequence.
    pub fn finish(self, result: AgentResult) {
        let _ = self.result.send(result);
    }
}

pub fn agent_channel() -> (AgentReporter, AgentHandle) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (result_tx, result_rx) = oneshot::channel();
    (
        AgentReporter {
            events: event_tx,
            result: result_tx,
        },
        AgentHandle {
            events: Some(event_rx),
            result: result_rx,
        },
    )
}

/// A short-lived verification command (precondition, success criterion, git).
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub command: String,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// `None` when killed by a signal or on timeout.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, _) => self.stderr.trim_end().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_yields_events_then_result() {
        let (reporter, mut handle) = agent_channel();
        let mut events = handle.take_events().unwrap();
        assert!(handle.take_events().is_none());

        reporter.emit(AgentEvent::Progress("working".into()));
        reporter.finish(Ok(AgentOutcome {
            summary: "ok".into(),
            ..Default::default()
        }));

        assert_eq!(events.recv().await, Some(AgentEvent::Progress("working".into())));
        assert_eq!(events.recv().await, None);
        assert_eq!(handle.outcome().await.unwrap().summary, "ok");
    }

    #[tokio::test]
    async fn dropped_reporter_is_disconnect() {
        let (reporter, handle) = agent_channel();
        drop(reporter);
        assert!(matches!(handle.outcome().await, Err(AgentError::Disconnected)));
    }
}
