//! Phase-gated orchestration of delegated agent tasks.
//!
//! ```text
//! TaskLayout::roster()          -> Vec<TaskDefinition>
//!   ↓
//! DependencyGraph::build()      -> validated graph (self-references filtered)
//!   ↓
//! Scheduler::run()              -> bounded, dependency-ordered launches
//!   ↓ (N in flight, one control thread)
//! TaskPipeline::run()           -> preconditions → phase gate → agent → bookkeeping
//!   ↓                              → validation → hallucination recovery
//! TaskRegistry                  <- every pipeline reports status here
//! ```

pub mod approval;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod machine;
pub mod record;
pub mod runner;
pub mod state;
pub mod tasks;
pub mod util;
pub mod validation;

pub use context::{AppContext, Services};
