use std::sync::Arc;

use anyhow::{bail, Result};

use phasegate_core::approval::{ApprovalProbe, MarkerApprovalProbe};
use phasegate_core::config::AppConfig;
use phasegate_core::executor::RetryStrategyPlugin;
use phasegate_core::runner::{CommandRunner, ExecutionAgent};
use phasegate_core::tasks::TaskLayout;
use phasegate_core::Services;

use crate::runner::{CodeCliAgent, ShellCommandRunner};
use crate::strategies::{ExponentialBackoffPlugin, LinearRetryPlugin};

pub fn build_agent(cfg: &AppConfig) -> Arc<dyn ExecutionAgent> {
    Arc::new(CodeCliAgent::new(cfg.agent.clone()))
}

pub fn build_command_runner(_cfg: &AppConfig) -> Arc<dyn CommandRunner> {
    Arc::new(ShellCommandRunner::new())
}

/// `None` retries immediately.
pub fn build_retry(cfg: &AppConfig) -> Result<Option<Arc<dyn RetryStrategyPlugin>>> {
    let strategy: Arc<dyn RetryStrategyPlugin> = match cfg.retry.strategy.as_str() {
        "exponential-backoff" | "exponential" => {
            Arc::new(ExponentialBackoffPlugin::new(cfg.retry.clone()))
        }
        "linear" => Arc::new(LinearRetryPlugin::new(cfg.retry.clone())),
        "none" | "immediate" => return Ok(None),
        other => bail!("unknown retry strategy '{other}' (expected exponential-backoff, linear or none)"),
    };
    Ok(Some(strategy))
}

pub fn build_approval_probe(cfg: &AppConfig, layout: &TaskLayout) -> Box<dyn ApprovalProbe> {
    Box::new(MarkerApprovalProbe::new(layout.clone(), &cfg.approval))
}

pub fn build_services(cfg: &AppConfig) -> Result<Services> {
    Ok(Services {
        agent: build_agent(cfg),
        commands: build_command_runner(cfg),
        retry: build_retry(cfg)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_strategy_by_name() {
        let mut cfg = AppConfig::default();
        assert_eq!(build_retry(&cfg).unwrap().unwrap().name(), "exponential-backoff");

        cfg.retry.strategy = "linear".to_string();
        assert_eq!(build_retry(&cfg).unwrap().unwrap().name(), "linear");

        cfg.retry.strategy = "none".to_string();
        assert!(build_retry(&cfg).unwrap().is_none());

        cfg.retry.strategy = "fibonacci".to_string();
        assert!(build_retry(&cfg).is_err());
    }

    #[test]
    fn services_use_configured_collaborators() {
        let services = build_services(&AppConfig::default()).unwrap();
        assert_eq!(services.agent.name(), "codecli");
        assert_eq!(services.commands.name(), "shell");
    }
}
