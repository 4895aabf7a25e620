//! Live progress display fed by registry events.

use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use phasegate_core::state::{DisplayAttachment, RegistryEvent, TaskStatus};
use phasegate_core::util::truncate_to;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;

const MESSAGE_WIDTH: usize = 80;

struct TaskLine {
    bar: ProgressBar,
    phase: Option<String>,
}

/// Overall bar plus one spinner per running task.
pub struct ProgressMonitor {
    multi: MultiProgress,
    overall: ProgressBar,
    tasks: HashMap<String, TaskLine>,
}

impl ProgressMonitor {
    pub fn new() -> Self {
        Self::with_bars(MultiProgress::new())
    }

    /// A monitor that tracks state but never draws.
    pub fn hidden() -> Self {
        Self::with_bars(MultiProgress::with_draw_target(
            indicatif::ProgressDrawTarget::hidden(),
        ))
    }

    fn with_bars(multi: MultiProgress) -> Self {
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );
        overall.set_message("starting");
        Self {
            multi,
            overall,
            tasks: HashMap::new(),
        }
    }

    pub fn apply(&mut self, event: &RegistryEvent) {
        match event {
            RegistryEvent::Registered { .. } => self.overall.inc_length(1),
            RegistryEvent::StatusChanged {
                task_id,
                new,
                message,
                ..
            } => match new {
                TaskStatus::Running => self.start(task_id),
                TaskStatus::Completed | TaskStatus::Failed => {
                    self.finish_task(task_id, *new == TaskStatus::Completed, message.as_deref())
                }
                TaskStatus::Pending => {}
            },
            RegistryEvent::PhaseChanged { task_id, phase } => {
                if let Some(line) = self.tasks.get_mut(task_id) {
                    line.phase = Some(phase.clone());
                    line.bar.set_message(format!("{task_id} [{phase}]"));
                }
            }
            RegistryEvent::Message { task_id, message } => {
                if let Some(line) = self.tasks.get(task_id) {
                    let phase = line.phase.as_deref().unwrap_or("running");
                    line.bar.set_message(format!(
                        "{task_id} [{phase}] {}",
                        truncate_to(message, MESSAGE_WIDTH)
                    ));
                }
            }
        }
    }

    fn start(&mut self, task_id: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.set_message(task_id.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        self.tasks
            .insert(task_id.to_string(), TaskLine { bar, phase: None });
        self.overall.set_message(format!("{} running", self.tasks.len()));
    }

    fn finish_task(&mut self, task_id: &str, success: bool, message: Option<&str>) {
        let icon = if success { "✅" } else { "❌" };
        let detail = message
            .map(|m| format!(": {}", truncate_to(m, MESSAGE_WIDTH)))
            .unwrap_or_default();
        match self.tasks.remove(task_id) {
            Some(line) => line
                .bar
                .finish_with_message(format!("{icon} {task_id}{detail}")),
            None => {
                // Failed before it ever started running.
                let _ = self.multi.println(format!("{icon} {task_id}{detail}"));
            }
        }
        self.overall.inc(1);
        self.overall.set_message(format!("{} running", self.tasks.len()));
    }

    pub fn finish(&mut self, success: bool) {
        for (_, line) in self.tasks.drain() {
            line.bar.finish_and_clear();
        }
        let msg = if success {
            "all tasks finished"
        } else {
            "some tasks did not finish"
        };
        self.overall.finish_with_message(msg);
    }

    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    pub fn finished(&self) -> u64 {
        self.overall.position()
    }
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Feeds registry events into the monitor until `stop` fires.
///
/// The attachment is held for the whole loop, so producers see a display
/// attached and keep per-event logging at trace level.
pub async fn drive(
    mut attachment: DisplayAttachment,
    mut monitor: ProgressMonitor,
    mut stop: oneshot::Receiver<bool>,
) {
    loop {
        tokio::select! {
            outcome = &mut stop => {
                // Drain what is already queued so the final state is drawn.
                while let Ok(event) = attachment.events.try_recv() {
                    monitor.apply(&event);
                }
                monitor.finish(outcome.unwrap_or(false));
                return;
            }
            event = attachment.events.recv() => match event {
                Ok(event) => monitor.apply(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::trace!(skipped, "display lagged behind registry events");
                }
                Err(RecvError::Closed) => {
                    monitor.finish(false);
                    return;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasegate_core::state::TaskRegistry;

    #[test]
    fn tracks_running_and_finished_tasks() {
        let mut monitor = ProgressMonitor::hidden();
        monitor.apply(&RegistryEvent::Registered {
            task_id: "TASK1".into(),
        });
        monitor.apply(&RegistryEvent::Registered {
            task_id: "TASK2".into(),
        });
        monitor.apply(&RegistryEvent::StatusChanged {
            task_id: "TASK1".into(),
            old: TaskStatus::Pending,
            new: TaskStatus::Running,
            message: None,
        });
        monitor.apply(&RegistryEvent::PhaseChanged {
            task_id: "TASK1".into(),
            phase: "phase 1: Setup".into(),
        });
        assert_eq!(monitor.running(), 1);

        monitor.apply(&RegistryEvent::StatusChanged {
            task_id: "TASK1".into(),
            old: TaskStatus::Running,
            new: TaskStatus::Completed,
            message: Some("done".into()),
        });
        monitor.apply(&RegistryEvent::StatusChanged {
            task_id: "TASK2".into(),
            old: TaskStatus::Pending,
            new: TaskStatus::Failed,
            message: Some("registry error".into()),
        });
        assert_eq!(monitor.running(), 0);
        assert_eq!(monitor.finished(), 2);
        monitor.finish(false);
    }

    #[tokio::test]
    async fn drive_attaches_until_stopped() {
        let registry = TaskRegistry::new();
        let attachment = registry.attach_display();
        let (stop_tx, stop_rx) = oneshot::channel();

        let work = async {
            assert!(registry.display_attached());
            registry.register("TASK1").await;
            registry.start("TASK1").await.unwrap();
            registry.complete("TASK1", "ok").await.unwrap();
            let _ = stop_tx.send(true);
        };
        tokio::join!(work, drive(attachment, ProgressMonitor::hidden(), stop_rx));

        assert!(!registry.display_attached());
    }
}
