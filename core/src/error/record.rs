use std::path::PathBuf;

use thiserror::Error;

use crate::record::PhaseStatus;

/// Structural errors of the persisted execution record. Never auto-repaired.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("failed to access record {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("record is not valid JSON: {0}")]
    Parse(String),

    #[error("record must be a JSON object")]
    NotAnObject,

    #[error("record missing required field '{0}'")]
    MissingField(&'static str),

    #[error("record has an invalid shape: {0}")]
    Invalid(String),

    #[error("record failed validation: {0}")]
    Validation(String),
}

/// Phase-gate violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("phase {0} does not exist")]
    UnknownPhase(u32),

    #[error("phase {phase} cannot become {requested:?}: phase {predecessor} is {predecessor_status:?}")]
    PredecessorIncomplete {
        phase: u32,
        requested: PhaseStatus,
        predecessor: u32,
        predecessor_status: PhaseStatus,
    },
}

#[derive(Error, Debug)]
pub enum ChecklistError {
    #[error("failed to read checklist {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("checklist matches neither supported schema: {0}")]
    Schema(String),
}

/// Why a precondition did not pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("command denied by rule '{rule}': {command}")]
    Denied { rule: String, command: String },

    #[error("precondition '{name}' failed: {evidence}")]
    Failed { name: String, evidence: String },
}

impl PreconditionError {
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}
