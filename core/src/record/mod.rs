//! Persisted per-task execution record (`execution.json`).

mod store;
mod types;

pub use store::{RecordStore, REQUIRED_FIELDS};
pub use types::{
    Artifact, ArtifactKind, CleanupFlags, Completion, CompletionStatus, CriterionKind,
    CriterionResult, ErrorEntry, ExecutionRecord, Phase, PhaseItem, PhaseStatus, PreCondition,
    RecordStatus, RemediationCategory, Severity, Uncertainty,
};
