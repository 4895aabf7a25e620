use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::executor::ConcurrencyLimit;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub tasks: TasksConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub preconditions: PreconditionsConfig,

    #[serde(default)]
    pub approval: ApprovalConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "phasegate_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Tasks directory, relative to the project root.
    #[serde(default = "default_tasks_dir")]
    pub dir: String,

    /// Explicit roster; empty means discover from `dir`.
    #[serde(default)]
    pub roster: Vec<String>,
}

fn default_tasks_dir() -> String {
    "tasks".to_string()
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            dir: default_tasks_dir(),
            roster: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Positive integer, or "unlimited".
    #[serde(default)]
    pub concurrency: ConcurrencyLimit,

    /// Extra attempts after the first one, per task and run.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    2
}

impl SchedulerConfig {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyLimit::default(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// "exponential-backoff" or "linear".
    #[serde(default = "default_retry_strategy")]
    pub strategy: String,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_retry_strategy() -> String {
    "exponential-backoff".to_string()
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: default_retry_strategy(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_command")]
    pub command: String,

    #[serde(default = "default_agent_args")]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Optional wall-clock limit for one delegation; none by default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Bytes of stderr kept for error-history traces.
    #[serde(default = "default_capture_bytes")]
    pub capture_bytes: usize,
}

fn default_agent_command() -> String {
    "claude".to_string()
}

fn default_agent_args() -> Vec<String> {
    ["-p", "--output-format", "stream-json", "--verbose"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_capture_bytes() -> usize {
    64 * 1024
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: default_agent_command(),
            args: default_agent_args(),
            env: HashMap::new(),
            timeout_secs: None,
            capture_bytes: default_capture_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreconditionsConfig {
    #[serde(default = "default_precondition_timeout_secs")]
    pub timeout_secs: u64,

    /// Additional regex patterns appended to the built-in denylist.
    #[serde(default)]
    pub extra_denylist: Vec<String>,
}

fn default_precondition_timeout_secs() -> u64 {
    30
}

impl Default for PreconditionsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_precondition_timeout_secs(),
            extra_denylist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    #[serde(default = "default_declaration")]
    pub declaration: String,

    #[serde(default = "default_marker")]
    pub marker: String,

    /// Non-empty lines at the top of the planning document searched for the declaration.
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_declaration() -> String {
    "**Status:** COMPLETED".to_string()
}

fn default_marker() -> String {
    "APPROVED".to_string()
}

fn default_window() -> usize {
    5
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            declaration: default_declaration(),
            marker: default_marker(),
            window: default_window(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownDependencyPolicy {
    /// Keep the edge; the dependent task stalls and is reported.
    #[default]
    Preserve,
    /// Fail graph construction.
    Reject,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub unknown_dependencies: UnknownDependencyPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Turn reconciliation mismatches into remediation categories.
    #[serde(default)]
    pub strict_reconciliation: bool,

    #[serde(default = "default_run_success_criteria")]
    pub run_success_criteria: bool,

    #[serde(default = "default_criteria_timeout_secs")]
    pub criteria_timeout_secs: u64,

    /// Max bytes of diagnostic trace kept per error-history entry.
    #[serde(default = "default_trace_limit")]
    pub trace_limit: usize,
}

fn default_run_success_criteria() -> bool {
    true
}

fn default_criteria_timeout_secs() -> u64 {
    120
}

fn default_trace_limit() -> usize {
    2000
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict_reconciliation: false,
            run_success_criteria: default_run_success_criteria(),
            criteria_timeout_secs: default_criteria_timeout_secs(),
            trace_limit: default_trace_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_display_enabled")]
    pub enabled: bool,
}

fn default_display_enabled() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: default_display_enabled(),
        }
    }
}
