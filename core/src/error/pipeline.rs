use thiserror::Error;

use super::error::AgentError;
use super::record::{GateError, RecordError};
use crate::state::TransitionError;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("task '{0}' is not registered")]
    UnknownTask(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Errors that end one task's pipeline and are re-raised to the scheduler.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("task '{0}' has no definition on disk")]
    MissingDefinition(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("agent failed for task '{task_id}': {source}")]
    Agent {
        task_id: String,
        #[source]
        source: AgentError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
