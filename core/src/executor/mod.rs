//! Dependency graph and DAG scheduling.
//!
//! ```text
//! Vec<TaskDefinition>
//!   ↓
//! DependencyGraph::build()   → tag parsing, self-references dropped,
//!   ↓                          unknown dependencies preserved or rejected
//! Scheduler::run()           → launches eligible pipelines up to the bound,
//!   ↓                          re-evaluates approval after each finish
//! SchedulerReport            → completed / failed / blocked (unresolved, unapproved)
//! ```

pub mod declaration;
mod graph;
mod scheduler;
pub mod traits;
pub mod types;

pub use graph::DependencyGraph;
pub use scheduler::Scheduler;
pub use traits::{PipelineRunner, RetryStrategyPlugin};
pub use types::{BlockedTask, ConcurrencyLimit, SchedulerOpts, SchedulerReport, TaskOutcome};
