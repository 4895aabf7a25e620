use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use phasegate_core::config::AgentConfig;
use phasegate_core::error::AgentError;
use phasegate_core::runner::{
    agent_channel, AgentHandle, AgentOutcome, AgentReporter, AgentRequest, ExecutionAgent,
};
use phasegate_core::util::{truncate_tail, RingBytes};

use super::stream_json::StreamJsonDecoder;

/// Execution agent backed by a code CLI subprocess emitting `stream-json`.
///
/// The prompt goes in on stdin; stdout is decoded line by line into events.
pub struct CodeCliAgent {
    cfg: AgentConfig,
}

impl CodeCliAgent {
    pub fn new(cfg: AgentConfig) -> Self {
        Self { cfg }
    }

    fn command(&self, request: &AgentRequest) -> Command {
        let mut cmd = Command::new(&self.cfg.command);
        cmd.args(&self.cfg.args)
            .envs(&self.cfg.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &request.workdir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl ExecutionAgent for CodeCliAgent {
    fn name(&self) -> &str {
        "codecli"
    }

    async fn delegate(&self, request: AgentRequest) -> Result<AgentHandle, AgentError> {
        let mut child = self
            .command(&request)
            .spawn()
            .map_err(|e| AgentError::Spawn(format!("{}: {e}", self.cfg.command)))?;
        tracing::debug!(
            task_id = %request.task_id,
            pid = child.id().unwrap_or(0),
            prompt_len = request.prompt.len(),
            "agent spawned"
        );

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(request.prompt.as_bytes()).await {
                Ok(()) => {}
                // The agent may exit without reading its prompt; its exit status tells why.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(AgentError::Io(format!("stdin: {e}"))),
            }
            // Dropping stdin signals end of prompt.
        }

        let (reporter, handle) = agent_channel();
        let capture = self.cfg.capture_bytes;
        let timeout = self.cfg.timeout_secs.map(Duration::from_secs);
        tokio::spawn(async move {
            let result = drive(child, &reporter, capture, timeout).await;
            reporter.finish(result);
        });
        Ok(handle)
    }
}

async fn drive(
    mut child: Child,
    reporter: &AgentReporter,
    capture: usize,
    timeout: Option<Duration>,
) -> Result<AgentOutcome, AgentError> {
    let started = Instant::now();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let read_stdout = async {
        let mut decoder = StreamJsonDecoder::new();
        if let Some(out) = stdout {
            let mut lines = BufReader::new(out).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        for event in decoder.decode_line(&line) {
                            reporter.emit(event);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "agent stdout read failed");
                        break;
                    }
                }
            }
        }
        decoder
    };

    let read_stderr = async {
        let mut ring = RingBytes::new(capture);
        if let Some(mut err) = stderr {
            let mut buf = [0u8; 8192];
            loop {
                match err.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => ring.push(&buf[..n]),
                    Err(e) => {
                        tracing::warn!(error = %e, "agent stderr read failed");
                        break;
                    }
                }
            }
        }
        ring
    };

    let run = async { tokio::join!(read_stdout, read_stderr, child.wait()) };
    let (decoder, ring, status) = match timeout {
        Some(limit) => match tokio::time::timeout(limit, run).await {
            Ok(done) => done,
            Err(_) => {
                let _ = child.kill().await;
                return Err(AgentError::Failed {
                    exit_code: None,
                    message: format!("timed out after {}s", limit.as_secs()),
                    trace: String::new(),
                });
            }
        },
        None => run.await,
    };
    let status = status.map_err(|e| AgentError::Io(e.to_string()))?;
    let elapsed = started.elapsed().as_millis() as u64;
    let trace = ring.to_string_lossy();

    let (claims, finished, last_text) = decoder.into_parts();
    let reported_ok = finished.as_ref().map_or(true, |f| f.success);
    if !status.success() || !reported_ok {
        let message = finished
            .map(|f| f.summary)
            .filter(|s| !s.trim().is_empty())
            .or(last_text)
            .unwrap_or_else(|| "agent reported failure".to_string());
        return Err(AgentError::Failed {
            exit_code: status.code(),
            message: truncate_tail(&message, 500),
            trace,
        });
    }

    let (summary, duration_ms, cost_usd) = match finished {
        Some(f) => (f.summary, f.duration_ms.or(Some(elapsed)), f.cost_usd),
        None => (last_text.unwrap_or_default(), Some(elapsed), None),
    };
    Ok(AgentOutcome {
        summary,
        duration_ms,
        cost_usd,
        claims,
    })
}
