use thiserror::Error;

use super::executor::{GraphError, SchedulerError};
use super::pipeline::PipelineError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("{failed} task(s) failed or stalled")]
    TasksFailed { failed: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Failures of short-lived verification commands (preconditions, criteria, git).
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("stream io error: {stream} {source}")]
    StreamIo {
        stream: &'static str,
        source: std::io::Error,
    },
}

/// Typed failures of an execution agent delegation.
#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error("agent spawn failed: {0}")]
    Spawn(String),
    #[error("agent exited with {exit_code:?}: {message}")]
    Failed {
        exit_code: Option<i32>,
        message: String,
        trace: String,
    },
    #[error("agent io error: {0}")]
    Io(String),
    #[error("agent disconnected before reporting a result")]
    Disconnected,
}

impl AgentError {
    /// Diagnostic output captured from the agent process, if any.
    pub fn trace(&self) -> Option<&str> {
        match self {
            Self::Failed { trace, .. } if !trace.is_empty() => Some(trace),
            _ => None,
        }
    }
}
