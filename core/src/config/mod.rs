mod load;
mod types;

pub use load::{apply_env_overrides, get_data_dir, load, LOCAL_CONFIG_FILE};
pub use types::{
    AgentConfig, AppConfig, ApprovalConfig, DisplayConfig, GraphConfig, LoggingConfig,
    PreconditionsConfig, RetryConfig, SchedulerConfig, TasksConfig, UnknownDependencyPolicy,
    ValidationConfig,
};
