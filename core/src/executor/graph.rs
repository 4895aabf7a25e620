use std::collections::{HashMap, HashSet};

use crate::config::UnknownDependencyPolicy;
use crate::error::GraphError;
use crate::executor::declaration::parse_dependencies;
use crate::tasks::TaskDefinition;

/// Validated task dependency graph. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Declaration order; the scheduler's tie-break.
    order: Vec<String>,

    /// Dependency edges: task_id -> tasks it waits for
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Builds the graph from task definitions read off disk.
    pub fn build(
        defs: &[TaskDefinition],
        policy: UnknownDependencyPolicy,
    ) -> Result<Self, GraphError> {
        let docs: Vec<(String, &str)> = defs
            .iter()
            .map(|d| (d.id.clone(), d.text.as_str()))
            .collect();
        Self::from_declarations(&docs, policy)
    }

    /// Pure construction from `(task_id, definition text)` pairs.
    pub fn from_declarations(
        docs: &[(String, &str)],
        policy: UnknownDependencyPolicy,
    ) -> Result<Self, GraphError> {
        let mut order: Vec<String> = Vec::with_capacity(docs.len());
        for (id, _) in docs {
            if order.iter().any(|known| known.eq_ignore_ascii_case(id)) {
                return Err(GraphError::DuplicateTaskId(id.clone()));
            }
            order.push(id.clone());
        }

        let mut edges = HashMap::with_capacity(docs.len());
        for (id, text) in docs {
            let deps = parse_dependencies(id, text, &order);
            for dep in deps.iter().filter(|d| !order.contains(d)) {
                match policy {
                    UnknownDependencyPolicy::Reject => {
                        return Err(GraphError::UnknownDependency {
                            task_id: id.clone(),
                            missing_dep: dep.clone(),
                        });
                    }
                    UnknownDependencyPolicy::Preserve => {
                        tracing::warn!(
                            task_id = %id,
                            dependency = %dep,
                            "dependency is not in the roster; task will stall"
                        );
                    }
                }
            }
            edges.insert(id.clone(), deps);
        }

        Ok(Self { order, edges })
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.edges.contains_key(task_id)
    }

    pub fn dependencies(&self, task_id: &str) -> &[String] {
        self.edges.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Dependencies of `task_id` that name no task in the graph.
    pub fn unresolved(&self, task_id: &str) -> Vec<String> {
        self.dependencies(task_id)
            .iter()
            .filter(|d| !self.contains(d))
            .cloned()
            .collect()
    }

    /// First dependency cycle found, as a closed path (`A -> B -> A`).
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for task_id in &self.order {
            if !visited.contains(task_id) && self.dfs_cycle(task_id, &mut visited, &mut stack) {
                return Some(stack);
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> bool {
        visited.insert(node.to_string());
        stack.push(node.to_string());

        for dep in self.dependencies(node) {
            if let Some(pos) = stack.iter().position(|x| x == dep) {
                stack.push(dep.clone());
                *stack = stack[pos..].to_vec();
                return true;
            }

            if self.contains(dep) && !visited.contains(dep) && self.dfs_cycle(dep, visited, stack)
            {
                return true;
            }
        }

        stack.pop();
        false
    }

    /// Kahn layering over resolved edges. Tasks that can never run (cycles,
    /// unresolved dependencies) appear in no layer.
    pub fn layers(&self) -> Vec<Vec<String>> {
        let mut remaining: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for id in &self.order {
            let deps = self.dependencies(id);
            let blocked_forever = deps.iter().any(|d| !self.contains(d));
            let degree = if blocked_forever { usize::MAX } else { deps.len() };
            remaining.insert(id.as_str(), degree);
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().push(id.as_str());
            }
        }

        let mut layers = Vec::new();
        let mut current: Vec<&str> = self
            .order
            .iter()
            .map(String::as_str)
            .filter(|id| remaining.get(id) == Some(&0))
            .collect();

        while !current.is_empty() {
            let mut next = Vec::new();
            for id in &current {
                for dependent in dependents.get(id).into_iter().flatten() {
                    if let Some(degree) = remaining.get_mut(dependent) {
                        if *degree != usize::MAX {
                            *degree -= 1;
                            if *degree == 0 {
                                next.push(*dependent);
                            }
                        }
                    }
                }
            }
            // Preserve declaration order within a layer.
            next.sort_by_key(|id| self.position(id));
            layers.push(current.iter().map(|s| s.to_string()).collect());
            current = next;
        }

        layers
    }

    fn position(&self, task_id: &str) -> usize {
        self.order
            .iter()
            .position(|k| k == task_id)
            .unwrap_or(usize::MAX)
    }
}
