//! Registry value types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Live status of a task in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What observers see for one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRuntimeState {
    pub task_id: String,
    pub status: TaskStatus,
    /// Current phase label, e.g. `preconditions` or `phase 2: Wire API`.
    pub phase: Option<String>,
    /// Last human-readable message.
    pub message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRuntimeState {
    pub fn new(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: TaskStatus::Pending,
            phase: None,
            message: None,
            started_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.started_at
            .map(|s| (self.updated_at - s).num_milliseconds().max(0) as u64)
    }
}

/// Broadcast on every registry mutation.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    Registered {
        task_id: String,
    },
    StatusChanged {
        task_id: String,
        old: TaskStatus,
        new: TaskStatus,
        message: Option<String>,
    },
    PhaseChanged {
        task_id: String,
        phase: String,
    },
    Message {
        task_id: String,
        message: String,
    },
}

impl RegistryEvent {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Registered { task_id }
            | Self::StatusChanged { task_id, .. }
            | Self::PhaseChanged { task_id, .. }
            | Self::Message { task_id, .. } => task_id,
        }
    }
}

/// Per-status tally.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}
