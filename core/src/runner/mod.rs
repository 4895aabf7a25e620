mod traits;
pub mod types;

pub use traits::{CommandRunner, ExecutionAgent};
pub use types::{
    agent_channel, AgentEvent, AgentHandle, AgentOutcome, AgentReporter, AgentRequest,
    ArtifactClaim, CommandOutput, CommandSpec,
};
