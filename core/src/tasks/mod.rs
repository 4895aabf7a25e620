//! On-disk task roster: identifiers, per-task document layout, definitions.

mod id;
mod layout;

pub use id::{is_task_id, natural_cmp, resolve_token};
pub use layout::{
    TaskDefinition, TaskLayout, TaskMode, CHECKLIST_FILE, LEGACY_PLAN_DOC, LEGACY_PROGRESS_DOC,
    RECORD_FILE, REVIEW_DOC, TASK_DOC,
};
