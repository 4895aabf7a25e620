use crate::error::GateError;
use crate::record::{ExecutionRecord, PhaseStatus, Severity};

/// Phase N may leave `pending` only after phase N-1 is `completed`.
pub struct PhaseGate;

impl PhaseGate {
    fn index_of(record: &ExecutionRecord, phase_id: u32) -> Result<usize, GateError> {
        record
            .phases
            .iter()
            .position(|p| p.id == phase_id)
            .ok_or(GateError::UnknownPhase(phase_id))
    }

    /// Checks that `phase_id` may move to `requested`.
    pub fn check(
        record: &ExecutionRecord,
        phase_id: u32,
        requested: PhaseStatus,
    ) -> Result<(), GateError> {
        let idx = Self::index_of(record, phase_id)?;
        if requested == PhaseStatus::Pending || idx == 0 {
            return Ok(());
        }
        let prev = &record.phases[idx - 1];
        if prev.status == PhaseStatus::Completed {
            Ok(())
        } else {
            Err(GateError::PredecessorIncomplete {
                phase: phase_id,
                requested,
                predecessor: prev.id,
                predecessor_status: prev.status,
            })
        }
    }

    pub fn transition(
        record: &mut ExecutionRecord,
        phase_id: u32,
        to: PhaseStatus,
    ) -> Result<(), GateError> {
        Self::check(record, phase_id, to)?;
        let idx = Self::index_of(record, phase_id)?;
        record.phases[idx].status = to;
        Ok(())
    }

    /// Every phase that is past `pending` while its predecessor is not `completed`.
    pub fn violations(record: &ExecutionRecord) -> Vec<GateError> {
        record
            .phases
            .windows(2)
            .filter(|w| w[1].status != PhaseStatus::Pending && w[0].status != PhaseStatus::Completed)
            .map(|w| GateError::PredecessorIncomplete {
                phase: w[1].id,
                requested: w[1].status,
                predecessor: w[0].id,
                predecessor_status: w[0].status,
            })
            .collect()
    }

    /// Reverts out-of-order phases to `pending`, in order, so one revert can
    /// cascade to the phases after it. Each revert is logged to error history.
    pub fn enforce(record: &mut ExecutionRecord) -> Vec<GateError> {
        let mut reverted = Vec::new();
        for idx in 1..record.phases.len() {
            let prev = &record.phases[idx - 1];
            let (prev_id, prev_status) = (prev.id, prev.status);
            let phase = &mut record.phases[idx];
            if phase.status == PhaseStatus::Pending || prev_status == PhaseStatus::Completed {
                continue;
            }
            let violation = GateError::PredecessorIncomplete {
                phase: phase.id,
                requested: phase.status,
                predecessor: prev_id,
                predecessor_status: prev_status,
            };
            phase.status = PhaseStatus::Pending;
            let phase_id = phase.id;
            tracing::warn!(phase = phase_id, error = %violation, "phase gate violation reverted");
            record.push_error(
                Severity::Error,
                Some(phase_id),
                format!("phase gate violation reverted to pending: {violation}"),
                None,
            );
            reverted.push(violation);
        }
        reverted
    }
}
