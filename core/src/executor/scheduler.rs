use std::collections::HashSet;
use std::time::Instant;

use futures::stream::FuturesUnordered;
use futures::StreamExt;

use crate::approval::ApprovalProbe;
use crate::error::SchedulerError;
use crate::state::TaskRegistry;

use super::graph::DependencyGraph;
use super::traits::PipelineRunner;
use super::types::{BlockedTask, SchedulerOpts, SchedulerReport};

/// Drives a dependency graph to completion under a concurrency bound.
///
/// All pipelines are polled from the caller's task; nothing is spawned. Each task
/// is launched at most once per run, retries live inside its pipeline.
pub struct Scheduler<'a> {
    graph: &'a DependencyGraph,
    registry: TaskRegistry,
    opts: SchedulerOpts,
}

impl<'a> Scheduler<'a> {
    pub fn new(graph: &'a DependencyGraph, registry: TaskRegistry, opts: SchedulerOpts) -> Self {
        Self {
            graph,
            registry,
            opts,
        }
    }

    #[tracing::instrument(name = "scheduler.run", skip_all, fields(tasks = self.graph.len(), concurrency = %self.opts.concurrency))]
    pub async fn run(
        &self,
        runner: &dyn PipelineRunner,
        probe: &dyn ApprovalProbe,
    ) -> Result<SchedulerReport, SchedulerError> {
        let started = Instant::now();
        let mut report = SchedulerReport::default();

        if let Some(only) = &self.opts.only {
            if let Some(unknown) = only.iter().find(|id| {
                !self.graph.order().iter().any(|t| t.eq_ignore_ascii_case(id))
            }) {
                return Err(SchedulerError::UnknownTask(unknown.clone()));
            }
        }

        for id in self.graph.order() {
            if self.opts.allows(id) {
                self.registry.register(id).await;
            }
        }

        let mut launched: HashSet<String> = HashSet::new();
        let mut in_flight = FuturesUnordered::new();

        loop {
            let approved = self.approved(probe);
            let mut slots = self.opts.concurrency.available(in_flight.len());

            for id in self.graph.order() {
                if slots == 0 {
                    break;
                }
                if launched.contains(id) || approved.contains(id) || !self.opts.allows(id) {
                    continue;
                }
                if !self
                    .graph
                    .dependencies(id)
                    .iter()
                    .all(|d| approved.contains(d))
                {
                    continue;
                }

                tracing::info!(task_id = %id, running = in_flight.len() + 1, "launching task pipeline");
                launched.insert(id.clone());
                let id = id.clone();
                in_flight.push(async move {
                    let result = runner.run_task(&id).await;
                    (id, result)
                });
                slots -= 1;
            }

            let Some((id, result)) = in_flight.next().await else {
                break;
            };

            match result {
                Ok(outcome) => {
                    tracing::info!(task_id = %id, outcome = %outcome.summary(), "task pipeline finished");
                    if outcome.is_success() {
                        report.completed.push(id);
                    } else {
                        report.failed.insert(id, outcome.summary());
                    }
                }
                Err(err) => {
                    tracing::error!(task_id = %id, error = %err, "task pipeline failed");
                    if let Err(reg_err) = self.registry.fail(&id, err.to_string()).await {
                        tracing::warn!(task_id = %id, error = %reg_err, "could not mark task failed");
                    }
                    report.failed.insert(id, err.to_string());
                }
            }
        }

        let approved = self.approved(probe);
        for id in self.graph.order() {
            if approved.contains(id) {
                report.approved.push(id.clone());
                continue;
            }
            if launched.contains(id) || !self.opts.allows(id) {
                continue;
            }
            let unresolved = self.graph.unresolved(id);
            let unapproved = self
                .graph
                .dependencies(id)
                .iter()
                .filter(|d| self.graph.contains(d) && !approved.contains(*d))
                .cloned()
                .collect();
            tracing::warn!(task_id = %id, ?unresolved, ?unapproved, "task stalled on unmet dependencies");
            report.blocked.insert(
                id.clone(),
                BlockedTask {
                    unresolved,
                    unapproved,
                },
            );
        }

        if !report.blocked.is_empty() {
            report.cycles.extend(self.graph.find_cycle());
        }
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    fn approved(&self, probe: &dyn ApprovalProbe) -> HashSet<String> {
        self.graph
            .order()
            .iter()
            .filter(|id| probe.is_approved(id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnknownDependencyPolicy;
    use crate::error::{AgentError, PipelineError};
    use crate::executor::types::{ConcurrencyLimit, TaskOutcome};
    use async_trait::async_trait;
    use std::cell::{Cell, RefCell};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default, Clone)]
    struct Approvals(Arc<Mutex<HashSet<String>>>);

    impl ApprovalProbe for Approvals {
        fn is_approved(&self, task_id: &str) -> bool {
            self.0.lock().unwrap().contains(task_id)
        }
    }

    struct FakeRunner {
        registry: TaskRegistry,
        approvals: Approvals,
        fail: HashSet<String>,
        running: Cell<usize>,
        max_running: Cell<usize>,
        started: RefCell<Vec<String>>,
    }

    impl FakeRunner {
        fn new(registry: TaskRegistry, approvals: Approvals) -> Self {
            Self {
                registry,
                approvals,
                fail: HashSet::new(),
                running: Cell::new(0),
                max_running: Cell::new(0),
                started: RefCell::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl PipelineRunner for FakeRunner {
        async fn run_task(&self, task_id: &str) -> Result<TaskOutcome, PipelineError> {
            self.registry.start(task_id).await?;
            self.started.borrow_mut().push(task_id.to_string());
            self.running.set(self.running.get() + 1);
            self.max_running
                .set(self.max_running.get().max(self.running.get()));

            tokio::time::sleep(Duration::from_millis(5)).await;
            self.running.set(self.running.get() - 1);

            if self.fail.contains(task_id) {
                return Err(PipelineError::Agent {
                    task_id: task_id.to_string(),
                    source: AgentError::Disconnected,
                });
            }
            self.approvals.0.lock().unwrap().insert(task_id.to_string());
            self.registry.complete(task_id, "done").await?;
            Ok(TaskOutcome::Completed)
        }
    }

    fn graph(docs: &[(&str, &str)]) -> DependencyGraph {
        let docs: Vec<(String, &str)> = docs.iter().map(|(i, t)| (i.to_string(), *t)).collect();
        DependencyGraph::from_declarations(&docs, UnknownDependencyPolicy::Preserve).unwrap()
    }

    fn opts(limit: usize) -> SchedulerOpts {
        SchedulerOpts {
            concurrency: ConcurrencyLimit::bounded(limit),
            only: None,
        }
    }

    #[tokio::test]
    async fn test_concurrency_bound_holds() {
        let g = graph(&[
            ("TASK1", ""),
            ("TASK2", ""),
            ("TASK3", ""),
            ("TASK4", ""),
            ("TASK5", ""),
        ]);
        let registry = TaskRegistry::new();
        let approvals = Approvals::default();
        let runner = FakeRunner::new(registry.clone(), approvals.clone());

        let report = Scheduler::new(&g, registry.clone(), opts(2))
            .run(&runner, &approvals)
            .await
            .unwrap();

        assert_eq!(runner.max_running.get(), 2);
        assert_eq!(report.completed.len(), 5);
        assert!(report.is_success());
        assert_eq!(registry.counts().await.completed, 5);
    }

    #[tokio::test]
    async fn test_dependencies_wait_for_approval() {
        let g = graph(&[("TASK2", "@dependencies TASK1"), ("TASK1", "")]);
        let registry = TaskRegistry::new();
        let approvals = Approvals::default();
        let runner = FakeRunner::new(registry.clone(), approvals.clone());

        let report = Scheduler::new(&g, registry, opts(4))
            .run(&runner, &approvals)
            .await
            .unwrap();

        assert_eq!(*runner.started.borrow(), vec!["TASK1", "TASK2"]);
        assert_eq!(report.approved, vec!["TASK2", "TASK1"]);
    }

    #[tokio::test]
    async fn test_already_approved_tasks_are_skipped() {
        let g = graph(&[("TASK1", ""), ("TASK2", "@dependencies TASK1")]);
        let registry = TaskRegistry::new();
        let approvals = Approvals::default();
        approvals.0.lock().unwrap().insert("TASK1".into());
        let runner = FakeRunner::new(registry.clone(), approvals.clone());

        Scheduler::new(&g, registry, opts(1))
            .run(&runner, &approvals)
            .await
            .unwrap();

        assert_eq!(*runner.started.borrow(), vec!["TASK2"]);
    }

    #[tokio::test]
    async fn test_failure_isolated_and_dependents_reported() {
        let g = graph(&[
            ("TASK1", ""),
            ("TASK2", ""),
            ("TASK3", "@dependencies TASK1"),
            ("TASK4", "@dependencies TASK9"),
        ]);
        let registry = TaskRegistry::new();
        let approvals = Approvals::default();
        let mut runner = FakeRunner::new(registry.clone(), approvals.clone());
        runner.fail.insert("TASK1".into());

        let report = Scheduler::new(&g, registry.clone(), opts(4))
            .run(&runner, &approvals)
            .await
            .unwrap();

        assert_eq!(report.completed, vec!["TASK2"]);
        assert!(report.failed.contains_key("TASK1"));
        assert_eq!(report.blocked["TASK3"].unapproved, vec!["TASK1"]);
        assert_eq!(report.blocked["TASK4"].unresolved, vec!["TASK9"]);
        assert!(!report.is_success());

        let state = registry.get("TASK1").await.unwrap();
        assert_eq!(state.status, crate::state::TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_only_filter_rejects_unknown_task() {
        let g = graph(&[("TASK1", "")]);
        let registry = TaskRegistry::new();
        let approvals = Approvals::default();
        let runner = FakeRunner::new(registry.clone(), approvals.clone());
        let opts = SchedulerOpts {
            only: Some(vec!["TASK7".into()]),
            ..Default::default()
        };

        let err = Scheduler::new(&g, registry, opts)
            .run(&runner, &approvals)
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownTask(id) if id == "TASK7"));
    }
}
