//! # Shared task state registry
//!
//! One in-process store of `{status, phase, message}` per task.
//!
//! - Each task's entry is written only by that task's own pipeline
//!   (the scheduler additionally registers it and records pipeline errors).
//! - Any number of observers read snapshots or subscribe to change events.
//! - A display consumer announces itself through [`TaskRegistry::attach_display`]
//!   so producers can keep per-event logging quiet while it renders.

pub mod registry;
pub mod transitions;
pub mod types;

pub use registry::{DisplayAttachment, TaskRegistry};
pub use transitions::{StateTransition, TransitionError};
pub use types::{RegistryEvent, StatusCounts, TaskRuntimeState, TaskStatus};
