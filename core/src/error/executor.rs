use thiserror::Error;

/// Errors raised while assembling the dependency graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("duplicate task id: {0}")]
    DuplicateTaskId(String),

    #[error("task definition not found for '{task_id}' (looked in {looked_in})")]
    MissingDefinition { task_id: String, looked_in: String },

    #[error("unknown dependency: task '{task_id}' depends on '{missing_dep}'")]
    UnknownDependency { task_id: String, missing_dep: String },

    #[error("failed to read task definitions: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that stop the scheduler itself (task failures never do).
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("task '{0}' is not part of the dependency graph")]
    UnknownTask(String),

    #[error("registry error: {0}")]
    Registry(#[from] super::pipeline::RegistryError),
}
