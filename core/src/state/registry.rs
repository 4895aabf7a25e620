//! Task state registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};

use super::transitions::StateTransition;
use super::types::{RegistryEvent, StatusCounts, TaskRuntimeState, TaskStatus};
use crate::error::RegistryError;

#[derive(Default)]
struct RegistryTable {
    /// Registration order, for stable display.
    order: Vec<String>,
    states: HashMap<String, TaskRuntimeState>,
}

struct RegistryInner {
    table: RwLock<RegistryTable>,
    event_tx: broadcast::Sender<RegistryEvent>,
    displays: AtomicUsize,
}

/// Cheaply cloneable handle to the shared registry.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
}

/// Keeps the registry in "display attached" mode while alive.
pub struct DisplayAttachment {
    pub events: broadcast::Receiver<RegistryEvent>,
    registry: Arc<RegistryInner>,
}

impl Drop for DisplayAttachment {
    fn drop(&mut self) {
        self.registry.displays.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(RegistryInner {
                table: RwLock::new(RegistryTable::default()),
                event_tx,
                displays: AtomicUsize::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Subscribes a live display; producers may suppress per-event logging meanwhile.
    pub fn attach_display(&self) -> DisplayAttachment {
        self.inner.displays.fetch_add(1, Ordering::SeqCst);
        DisplayAttachment {
            events: self.inner.event_tx.subscribe(),
            registry: self.inner.clone(),
        }
    }

    pub fn display_attached(&self) -> bool {
        self.inner.displays.load(Ordering::SeqCst) > 0
    }

    fn emit(&self, event: RegistryEvent) {
        // No subscribers is fine.
        let _ = self.inner.event_tx.send(event);
    }

    /// Creates a pending entry; an existing entry is retained as-is.
    pub async fn register(&self, task_id: &str) {
        {
            let mut table = self.inner.table.write().await;
            if table.states.contains_key(task_id) {
                return;
            }
            table.order.push(task_id.to_string());
            table
                .states
                .insert(task_id.to_string(), TaskRuntimeState::new(task_id));
        }
        self.emit(RegistryEvent::Registered {
            task_id: task_id.to_string(),
        });
    }

    async fn transition(
        &self,
        task_id: &str,
        to: TaskStatus,
        message: Option<String>,
    ) -> Result<(), RegistryError> {
        let old = {
            let mut table = self.inner.table.write().await;
            let state = table
                .states
                .get_mut(task_id)
                .ok_or_else(|| RegistryError::UnknownTask(task_id.to_string()))?;
            let old = state.status;
            StateTransition::validate(old, to)?;

            let now = Utc::now();
            state.status = to;
            state.updated_at = now;
            if to == TaskStatus::Running {
                state.started_at = Some(now);
            }
            if message.is_some() {
                state.message = message.clone();
            }
            old
        };

        self.emit(RegistryEvent::StatusChanged {
            task_id: task_id.to_string(),
            old,
            new: to,
            message,
        });
        Ok(())
    }

    pub async fn start(&self, task_id: &str) -> Result<(), RegistryError> {
        self.transition(task_id, TaskStatus::Running, None).await
    }

    pub async fn complete(
        &self,
        task_id: &str,
        message: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.transition(task_id, TaskStatus::Completed, Some(message.into()))
            .await
    }

    pub async fn fail(&self, task_id: &str, message: impl Into<String>) -> Result<(), RegistryError> {
        self.transition(task_id, TaskStatus::Failed, Some(message.into()))
            .await
    }

    pub async fn set_phase(&self, task_id: &str, phase: impl Into<String>) -> Result<(), RegistryError> {
        let phase = phase.into();
        {
            let mut table = self.inner.table.write().await;
            let state = table
                .states
                .get_mut(task_id)
                .ok_or_else(|| RegistryError::UnknownTask(task_id.to_string()))?;
            state.phase = Some(phase.clone());
            state.updated_at = Utc::now();
        }
        self.emit(RegistryEvent::PhaseChanged {
            task_id: task_id.to_string(),
            phase,
        });
        Ok(())
    }

    pub async fn set_message(
        &self,
        task_id: &str,
        message: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let message = message.into();
        {
            let mut table = self.inner.table.write().await;
            let state = table
                .states
                .get_mut(task_id)
                .ok_or_else(|| RegistryError::UnknownTask(task_id.to_string()))?;
            state.message = Some(message.clone());
            state.updated_at = Utc::now();
        }
        self.emit(RegistryEvent::Message {
            task_id: task_id.to_string(),
            message,
        });
        Ok(())
    }

    pub async fn get(&self, task_id: &str) -> Option<TaskRuntimeState> {
        self.inner.table.read().await.states.get(task_id).cloned()
    }

    /// All entries in registration order.
    pub async fn snapshot(&self) -> Vec<TaskRuntimeState> {
        let table = self.inner.table.read().await;
        table
            .order
            .iter()
            .filter_map(|id| table.states.get(id).cloned())
            .collect()
    }

    pub async fn counts(&self) -> StatusCounts {
        let table = self.inner.table.read().await;
        let mut counts = StatusCounts::default();
        for state in table.states.values() {
            match state.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub async fn running_count(&self) -> usize {
        self.counts().await.running
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_task_lifecycle() {
        let registry = TaskRegistry::new();
        registry.register("TASK1").await;
        assert_eq!(registry.counts().await.pending, 1);

        registry.start("TASK1").await.unwrap();
        registry.set_phase("TASK1", "phase 1: Setup").await.unwrap();
        assert_eq!(registry.running_count().await, 1);

        registry.complete("TASK1", "done").await.unwrap();
        let state = registry.get("TASK1").await.unwrap();
        assert_eq!(state.status, TaskStatus::Completed);
        assert_eq!(state.phase.as_deref(), Some("phase 1: Setup"));
        assert_eq!(state.message.as_deref(), Some("done"));
        assert!(state.duration_ms().is_some());
    }

    #[tokio::test]
    async fn test_register_is_idempotent_and_ordered() {
        let registry = TaskRegistry::new();
        registry.register("TASK2").await;
        registry.register("TASK1").await;
        registry.start("TASK2").await.unwrap();
        registry.register("TASK2").await;

        let snapshot = registry.snapshot().await;
        let ids: Vec<_> = snapshot.iter().map(|s| s.task_id.as_str()).collect();
        assert_eq!(ids, vec!["TASK2", "TASK1"]);
        assert_eq!(snapshot[0].status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_invalid_transition_rejected() {
        let registry = TaskRegistry::new();
        registry.register("TASK1").await;
        assert!(registry.complete("TASK1", "skipped run").await.is_err());
        assert!(matches!(
            registry.start("TASK9").await,
            Err(RegistryError::UnknownTask(_))
        ));
    }

    #[tokio::test]
    async fn test_display_attachment_flag() {
        let registry = TaskRegistry::new();
        assert!(!registry.display_attached());

        let attachment = registry.attach_display();
        assert!(registry.display_attached());

        drop(attachment);
        assert!(!registry.display_attached());
    }

    #[tokio::test]
    async fn test_event_subscription() {
        let registry = TaskRegistry::new();
        let mut rx = registry.subscribe();

        registry.register("TASK1").await;
        registry.start("TASK1").await.unwrap();

        match rx.recv().await {
            Ok(RegistryEvent::Registered { task_id }) => assert_eq!(task_id, "TASK1"),
            other => panic!("expected Registered, got {other:?}"),
        }
        match rx.recv().await {
            Ok(RegistryEvent::StatusChanged { old, new, .. }) => {
                assert_eq!(old, TaskStatus::Pending);
                assert_eq!(new, TaskStatus::Running);
            }
            other => panic!("expected StatusChanged, got {other:?}"),
        }
    }
}
