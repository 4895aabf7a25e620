use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use phasegate_core::error::RunnerError;
use phasegate_core::runner::{CommandOutput, CommandRunner, CommandSpec};

/// Runs verification commands through the platform shell with a hard timeout.
/// A timed-out child is killed when its handle drops.
#[derive(Debug, Default, Clone)]
pub struct ShellCommandRunner;

impl ShellCommandRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C");
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c");
            c
        };
        cmd.arg(&spec.command)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    fn name(&self) -> &str {
        "shell"
    }

    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        let started = Instant::now();
        let child = Self::command(spec)
            .spawn()
            .map_err(|e| RunnerError::Spawn(format!("{}: {e}", spec.command)))?;

        match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(Ok(out)) => {
                let output = CommandOutput {
                    exit_code: out.status.code(),
                    stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                    timed_out: false,
                    duration: started.elapsed(),
                };
                tracing::debug!(
                    command = %spec.command,
                    exit_code = ?output.exit_code,
                    duration_ms = output.duration.as_millis() as u64,
                    "command finished"
                );
                Ok(output)
            }
            Ok(Err(source)) => Err(RunnerError::StreamIo {
                stream: "output",
                source,
            }),
            Err(_) => {
                tracing::warn!(command = %spec.command, timeout_secs = spec.timeout.as_secs(), "command timed out");
                Ok(CommandOutput {
                    timed_out: true,
                    duration: started.elapsed(),
                    ..Default::default()
                })
            }
        }
    }
}
