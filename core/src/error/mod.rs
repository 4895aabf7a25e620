#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod record;

pub use error::{AgentError, CliError, RunnerError};
pub use executor::{GraphError, SchedulerError};
pub use pipeline::{PipelineError, RegistryError};
pub use record::{ChecklistError, GateError, PreconditionError, RecordError};
