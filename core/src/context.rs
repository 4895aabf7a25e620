use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::CliError;
use crate::executor::RetryStrategyPlugin;
use crate::machine::CommandDenylist;
use crate::runner::{CommandRunner, ExecutionAgent};
use crate::state::TaskRegistry;
use crate::tasks::TaskLayout;

/// Collaborators behind the core traits, built by the plugins crate.
#[derive(Clone)]
pub struct Services {
    pub agent: Arc<dyn ExecutionAgent>,
    pub commands: Arc<dyn CommandRunner>,
    pub retry: Option<Arc<dyn RetryStrategyPlugin>>,
}

/// Everything one engine run needs, constructed once and passed down explicitly.
///
/// Independent contexts can coexist in one process (each with its own registry).
#[derive(Clone)]
pub struct AppContext {
    cfg: AppConfig,
    project_root: PathBuf,
    layout: TaskLayout,
    registry: TaskRegistry,
    denylist: Arc<CommandDenylist>,
    services: Services,
}

impl AppContext {
    pub fn new(
        cfg: AppConfig,
        project_root: impl Into<PathBuf>,
        services: Services,
    ) -> Result<Self, CliError> {
        let project_root = project_root.into();
        let layout = TaskLayout::new(project_root.join(&cfg.tasks.dir));
        let denylist = CommandDenylist::standard()
            .with_extra(&cfg.preconditions.extra_denylist)
            .map_err(|e| CliError::Config(format!("preconditions.extra_denylist: {e}")))?;
        Ok(Self {
            cfg,
            project_root,
            layout,
            registry: TaskRegistry::new(),
            denylist: Arc::new(denylist),
            services,
        })
    }

    pub fn cfg(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn layout(&self) -> &TaskLayout {
        &self.layout
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn denylist(&self) -> &CommandDenylist {
        &self.denylist
    }

    pub fn services(&self) -> &Services {
        &self.services
    }
}
