//! Independent checkers consulted by the execution state machine.
//!
//! Every checker reads the record and planning documents and returns a
//! [`CheckReport`]; only the pipeline mutates state from their verdicts.

mod cascade;
mod checklist;
mod criteria;
pub mod markdown;
mod reconcile;
mod strategy;
mod types;

pub use cascade::{CascadeMatch, MatcherCascade};
pub use checklist::{check_checklist, entry_problems, ChecklistEntry, ReviewChecklist, ReviewedFile};
pub use criteria::{
    classify_command, evaluate, is_executable, locate_table, parse_criteria, CommandShape,
    CriteriaChecker, CriteriaOutcome, Criterion,
};
pub use reconcile::{parse_porcelain, reconcile, ReconcileReport, Reconciler};
pub use strategy::{check_strategy, outline, seed_record, OutlinePhase};
pub use types::{CheckReport, ValidationIssue};
