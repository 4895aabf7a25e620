//! # Per-task execution state machine
//!
//! ```text
//! load / seed record
//!   → preconditions (denylist screen, then run)   ─ denied → blocked
//!   → for each phase: gate → in_progress → agent → reload → claims → gate audit
//!   → validators + completion check
//!   → hallucination recovery
//!   → persist (after every step)
//! ```

mod bookkeeping;
mod completion;
mod gate;
mod legacy;
mod pipeline;
mod precondition;
mod prompt;
mod recovery;
mod security;

pub use bookkeeping::{normalize_path, record_claims, verify_artifacts};
pub use completion::{validate_completion, CompletionCheck, IncompleteReason};
pub use gate::PhaseGate;
pub use legacy::{parse_preconditions, unticked_steps, LegacyPipeline};
pub use pipeline::{TaskPipeline, ValidationVerdict};
pub use precondition::{PreconditionVerdict, PreconditionVerifier};
pub use prompt::{legacy_prompt, phase_prompt};
pub use recovery::{detect_hallucinations, recover, RecoveryReport};
pub use security::{CommandDenylist, DenyRule};
