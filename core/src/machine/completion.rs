use std::fmt;

use crate::record::{ExecutionRecord, PhaseStatus, RemediationCategory};

/// One failing element of completion validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncompleteReason {
    Phase { phase: u32, status: PhaseStatus },
    Item { phase: u32, item: String },
    Precondition { phase: u32, name: String },
    Artifact { path: String },
    Criterion { criterion: String },
    Cleanup { flag: &'static str },
}

impl IncompleteReason {
    pub fn category(&self) -> RemediationCategory {
        match self {
            Self::Phase { .. } => RemediationCategory::IncompletePhases,
            Self::Item { .. } => RemediationCategory::IncompleteItems,
            Self::Precondition { .. } => RemediationCategory::FailedPreconditions,
            Self::Artifact { .. } => RemediationCategory::UnverifiedArtifacts,
            Self::Criterion { .. } => RemediationCategory::UnmetSuccessCriteria,
            Self::Cleanup { .. } => RemediationCategory::CleanupRequired,
        }
    }
}

impl fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phase { phase, status } => write!(f, "phase {phase} is {status:?}"),
            Self::Item { phase, item } => write!(f, "item {item} of phase {phase} is not completed"),
            Self::Precondition { phase, name } => {
                write!(f, "precondition '{name}' of phase {phase} has not passed")
            }
            Self::Artifact { path } => write!(f, "artifact {path} is not verified"),
            Self::Criterion { criterion } => write!(f, "success criterion not met: {criterion}"),
            Self::Cleanup { flag } => write!(f, "cleanup check failed: {flag}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionCheck {
    pub reasons: Vec<IncompleteReason>,
}

impl CompletionCheck {
    pub fn is_complete(&self) -> bool {
        self.reasons.is_empty()
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Vec<RemediationCategory> {
        let mut cats: Vec<_> = self.reasons.iter().map(IncompleteReason::category).collect();
        cats.sort();
        cats.dedup();
        cats
    }
}

/// Conjunctive completion check. Yields exactly one reason per failing element;
/// manual-only success criteria are not part of the conjunction.
pub fn validate_completion(record: &ExecutionRecord) -> CompletionCheck {
    let mut reasons = Vec::new();

    for phase in &record.phases {
        if phase.status != PhaseStatus::Completed {
            reasons.push(IncompleteReason::Phase {
                phase: phase.id,
                status: phase.status,
            });
        }
        for item in phase.items.iter().filter(|i| i.status != PhaseStatus::Completed) {
            reasons.push(IncompleteReason::Item {
                phase: phase.id,
                item: item.id.clone(),
            });
        }
        for pc in phase.preconditions.iter().filter(|pc| !pc.passed) {
            reasons.push(IncompleteReason::Precondition {
                phase: phase.id,
                name: pc.name.clone(),
            });
        }
    }

    for artifact in record.artifacts.iter().filter(|a| !a.verified) {
        reasons.push(IncompleteReason::Artifact {
            path: artifact.path.clone(),
        });
    }

    for criterion in record
        .success_criteria
        .iter()
        .filter(|c| c.kind.is_automatic() && !c.passed)
    {
        reasons.push(IncompleteReason::Criterion {
            criterion: criterion.criterion.clone(),
        });
    }

    if let Some(cleanup) = &record.completion.cleanup {
        for flag in cleanup.failing() {
            reasons.push(IncompleteReason::Cleanup { flag });
        }
    }

    CompletionCheck { reasons }
}
