//! Concrete collaborators behind the `phasegate-core` traits.

pub mod factory;
pub mod runner;
pub mod strategies;

pub use factory::{
    build_agent, build_approval_probe, build_command_runner, build_retry, build_services,
};
