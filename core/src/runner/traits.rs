use async_trait::async_trait;

use crate::error::{AgentError, RunnerError};

use super::types::{AgentHandle, AgentRequest, CommandOutput, CommandSpec};

/// External execution agent boundary.
///
/// `delegate` returns once the agent is launched; the handle resolves when it ends.
#[async_trait]
pub trait ExecutionAgent: Send + Sync {
    fn name(&self) -> &str;
    async fn delegate(&self, request: AgentRequest) -> Result<AgentHandle, AgentError>;
}

/// Runs verification commands with a hard timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError>;
}
