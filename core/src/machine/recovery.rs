//! Hallucination detection and state rollback.
//!
//! An agent's claim that a file exists is never trusted: every non-deleted
//! artifact is checked on disk, and a missing one rolls back whatever phase
//! relied on it.

use std::path::Path;

use crate::record::{
    ArtifactKind, CompletionStatus, ExecutionRecord, PhaseStatus, RecordStatus,
    RemediationCategory, Severity,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub missing: Vec<String>,
    pub reverted_phases: Vec<u32>,
    pub flagged_items: Vec<(u32, String)>,
}

/// Declared non-deleted artifacts that do not exist under `root`.
pub fn detect_hallucinations(record: &ExecutionRecord, root: &Path) -> Vec<String> {
    record
        .artifacts
        .iter()
        .filter(|a| a.kind != ArtifactKind::Deleted)
        .filter(|a| !root.join(&a.path).exists())
        .map(|a| a.path.clone())
        .collect()
}

/// Rolls back the record for `missing` artifacts and appends one CRITICAL entry.
pub fn recover(record: &mut ExecutionRecord, missing: &[String]) -> RecoveryReport {
    let mut report = RecoveryReport {
        missing: missing.to_vec(),
        ..Default::default()
    };
    if missing.is_empty() {
        return report;
    }

    for path in missing {
        if let Some(artifact) = record.artifact_mut(path) {
            artifact.verified = false;
            artifact.hallucination_detected = Some(true);
        }
    }

    let references = |text: &str| missing.iter().any(|p| text.contains(p.as_str()));
    for phase in &mut record.phases {
        let mut touched = false;
        for item in &mut phase.items {
            let cited = references(&item.description)
                || item.evidence.as_deref().is_some_and(|e| references(e));
            if cited {
                item.status = PhaseStatus::Pending;
                item.flagged = true;
                report.flagged_items.push((phase.id, item.id.clone()));
                touched = true;
            }
        }
        if touched && phase.status == PhaseStatus::Completed {
            phase.status = PhaseStatus::InProgress;
            report.reverted_phases.push(phase.id);
        }
    }

    let phase = report.reverted_phases.first().copied();
    record.push_error(
        Severity::Critical,
        phase,
        format!(
            "hallucinated artifacts: {} declared but not found on disk",
            missing.join(", ")
        ),
        None,
    );

    if record.status == RecordStatus::Completed {
        record.status = RecordStatus::InProgress;
    }
    record.completion.status = CompletionStatus::PendingRecovery;
    if !record
        .completion
        .pending_remediation
        .contains(&RemediationCategory::Hallucination)
    {
        record
            .completion
            .pending_remediation
            .push(RemediationCategory::Hallucination);
    }

    tracing::warn!(
        missing = ?report.missing,
        reverted = ?report.reverted_phases,
        "hallucinated artifacts rolled back"
    );
    report
}
