use std::collections::BTreeMap;

use crate::record::RemediationCategory;

/// How one pipeline run ended, when it did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// The record was already `completed` when the run started.
    AlreadyCompleted,
    /// A precondition was denied; the record is now `blocked`.
    Blocked { reason: String },
    PreconditionsFailed { failures: Vec<String> },
    /// Retry ceiling reached without passing completion validation.
    Incomplete {
        reasons: Vec<String>,
        remediation: Vec<RemediationCategory>,
    },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::AlreadyCompleted)
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Completed => "completed".to_string(),
            Self::AlreadyCompleted => "already completed".to_string(),
            Self::Blocked { reason } => format!("blocked: {reason}"),
            Self::PreconditionsFailed { failures } => {
                format!("{} precondition(s) failed", failures.len())
            }
            Self::Incomplete { reasons, .. } => match reasons.first() {
                Some(first) if reasons.len() > 1 => {
                    format!("incomplete: {first} (+{} more)", reasons.len() - 1)
                }
                Some(first) => format!("incomplete: {first}"),
                None => "incomplete".to_string(),
            },
        }
    }
}

/// Unmet dependencies of a task that never became eligible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockedTask {
    /// Dependencies that are not in the roster at all.
    pub unresolved: Vec<String>,
    /// Dependencies in the roster that never got approved.
    pub unapproved: Vec<String>,
}

/// Result of one scheduler run.
#[derive(Debug, Clone, Default)]
pub struct SchedulerReport {
    /// Approved at the end of the run, whether before or during it.
    pub approved: Vec<String>,
    /// Pipelines that finished successfully in this run.
    pub completed: Vec<String>,
    /// Non-success outcomes and pipeline errors, task -> message.
    pub failed: BTreeMap<String, String>,
    pub blocked: BTreeMap<String, BlockedTask>,
    pub cycles: Vec<Vec<String>>,
    pub duration_ms: u64,
}

impl SchedulerReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.blocked.is_empty()
    }

    pub fn stalled(&self) -> usize {
        self.blocked.len()
    }
}
