use async_trait::async_trait;

use crate::error::PipelineError;
use crate::executor::types::TaskOutcome;

/// Runs one task's pipeline to an outcome. Implemented by the execution state machine.
#[async_trait(?Send)]
pub trait PipelineRunner {
    async fn run_task(&self, task_id: &str) -> Result<TaskOutcome, PipelineError>;
}
