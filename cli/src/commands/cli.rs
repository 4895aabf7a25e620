use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use phasegate_core::executor::ConcurrencyLimit;

#[derive(Parser, Debug)]
#[command(name = "phasegate", version, about = "Phase-gated orchestration of delegated agent tasks")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file; defaults to ./phasegate.toml, then ~/.phasegate/config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project root the tasks directory and agent workdir resolve against.
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Schedule the dependency graph and run every eligible task.
    Run(RunArgs),
    /// Print the dependency graph and which tasks are eligible now.
    Graph(OutputArgs),
    /// Print execution records and approval state per task.
    Status(OutputArgs),
    /// Run completion validation for one task without delegating.
    Check(CheckArgs),
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RunArgs {
    /// Max pipelines in flight: a positive integer or "unlimited".
    #[arg(long)]
    pub concurrency: Option<ConcurrencyLimit>,

    /// Extra attempts per task after the first.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Only launch these tasks (repeatable). Bare numbers match the task's number.
    #[arg(long = "task", action = clap::ArgAction::Append)]
    pub tasks: Vec<String>,

    /// Disable the live progress display.
    #[arg(long)]
    pub no_display: bool,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct OutputArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CheckArgs {
    /// Task identifier, e.g. TASK3 or 3.
    pub task: String,

    #[arg(long)]
    pub json: bool,
}
