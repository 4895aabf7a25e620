pub mod pipeline;
pub mod strategy;

pub use pipeline::*;
pub use strategy::*;
