use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

/// Status of a phase and of the items inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    PendingValidation,
    Completed,
    PendingRecovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Why a task is not yet complete; persisted so the next delegation can address it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationCategory {
    IncompletePhases,
    IncompleteItems,
    FailedPreconditions,
    UnverifiedArtifacts,
    MissingPhase,
    UnmetSuccessCriteria,
    NonExecutableCriterion,
    UnmetChecklistItems,
    CleanupRequired,
    UndeclaredChanges,
    UnchangedArtifacts,
    Hallucination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    Automatic,
    Manual,
    Both,
}

impl CriterionKind {
    pub fn is_automatic(self) -> bool {
        matches!(self, Self::Automatic | Self::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub status: RecordStatus,
    pub phases: Vec<Phase>,
    pub artifacts: Vec<Artifact>,
    pub completion: Completion,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_criteria: Vec<CriterionResult>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncertainties: Vec<Uncertainty>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_history: Vec<ErrorEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub id: u32,
    pub name: String,
    pub status: PhaseStatus,
    #[serde(default)]
    pub preconditions: Vec<PreCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<PhaseItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreCondition {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub expected: String,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseItem {
    pub id: String,
    pub description: String,
    pub status: PhaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    /// Set when recovery un-completed this item.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub flagged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub path: String,
    pub kind: ArtifactKind,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hallucination_detected: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub status: CompletionStatus,
    #[serde(default)]
    pub pending_remediation: Vec<RemediationCategory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupFlags>,
}

impl Default for Completion {
    fn default() -> Self {
        Self {
            status: CompletionStatus::PendingValidation,
            pending_remediation: Vec::new(),
            reasons: Vec::new(),
            cleanup: None,
        }
    }
}

/// Cleanup claims; only an explicit `false` blocks completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_output_removed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatting_consistent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_dead_code: Option<bool>,
}

impl CleanupFlags {
    /// Names of flags explicitly set to `false`.
    pub fn failing(&self) -> Vec<&'static str> {
        [
            ("debugOutputRemoved", self.debug_output_removed),
            ("formattingConsistent", self.formatting_consistent),
            ("noDeadCode", self.no_dead_code),
        ]
        .into_iter()
        .filter(|(_, v)| *v == Some(false))
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionResult {
    pub criterion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub kind: CriterionKind,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Uncertainty {
    pub topic: String,
    pub detail: String,
    pub raised_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<u32>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl ExecutionRecord {
    /// A fresh record with the given `(id, name)` phases, all pending.
    pub fn seeded(phases: impl IntoIterator<Item = (u32, String)>) -> Self {
        Self {
            status: RecordStatus::Pending,
            phases: phases
                .into_iter()
                .map(|(id, name)| Phase {
                    id,
                    name,
                    status: PhaseStatus::Pending,
                    preconditions: Vec::new(),
                    items: Vec::new(),
                })
                .collect(),
            artifacts: Vec::new(),
            completion: Completion::default(),
            success_criteria: Vec::new(),
            uncertainties: Vec::new(),
            error_history: Vec::new(),
            updated_at: None,
        }
    }

    pub fn phase(&self, id: u32) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    pub fn phase_mut(&mut self, id: u32) -> Option<&mut Phase> {
        self.phases.iter_mut().find(|p| p.id == id)
    }

    pub fn artifact_mut(&mut self, path: &str) -> Option<&mut Artifact> {
        self.artifacts.iter_mut().find(|a| a.path == path)
    }

    pub fn preconditions_mut(&mut self) -> Vec<&mut PreCondition> {
        self.phases
            .iter_mut()
            .flat_map(|p| p.preconditions.iter_mut())
            .collect()
    }

    pub fn push_error(
        &mut self,
        severity: Severity,
        phase: Option<u32>,
        message: impl Into<String>,
        trace: Option<String>,
    ) {
        self.error_history.push(ErrorEntry {
            timestamp: Utc::now(),
            severity,
            phase,
            message: message.into(),
            trace,
        });
    }

    /// Adds an open uncertainty unless an identical open one exists.
    pub fn push_uncertainty(&mut self, topic: impl Into<String>, detail: impl Into<String>) {
        let topic = topic.into();
        let detail = detail.into();
        let exists = self
            .uncertainties
            .iter()
            .any(|u| !u.resolved && u.topic == topic && u.detail == detail);
        if !exists {
            self.uncertainties.push(Uncertainty {
                topic,
                detail,
                raised_at: Utc::now(),
                resolved: false,
            });
        }
    }

    /// Structural checks beyond what deserialisation enforces.
    pub fn validate(&self) -> Result<(), RecordError> {
        let mut last_id: Option<u32> = None;
        for phase in &self.phases {
            if phase.name.trim().is_empty() {
                return Err(RecordError::Validation(format!(
                    "phase {} has an empty name",
                    phase.id
                )));
            }
            if let Some(prev) = last_id {
                if phase.id <= prev {
                    return Err(RecordError::Validation(format!(
                        "phase ids must increase: {} follows {}",
                        phase.id, prev
                    )));
                }
            }
            last_id = Some(phase.id);

            for pc in &phase.preconditions {
                if pc.command.trim().is_empty() {
                    return Err(RecordError::Validation(format!(
                        "precondition '{}' in phase {} has no command",
                        pc.name, phase.id
                    )));
                }
            }
        }

        if let Some(a) = self.artifacts.iter().find(|a| a.path.trim().is_empty()) {
            return Err(RecordError::Validation(format!(
                "artifact of kind {:?} has an empty path",
                a.kind
            )));
        }

        Ok(())
    }
}
