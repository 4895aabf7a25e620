use std::collections::HashSet;

use phasegate_core::error::CliError;
use phasegate_core::executor::DependencyGraph;
use phasegate_core::AppContext;
use phasegate_plugins::build_approval_probe;
use serde_json::json;

use super::cli::OutputArgs;
use super::EXIT_OK;

/// Where a task stands with respect to scheduling right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Approved,
    Eligible,
    Waiting(Vec<String>),
    Unresolved(Vec<String>),
}

impl Eligibility {
    fn label(&self) -> String {
        match self {
            Self::Approved => "approved".to_string(),
            Self::Eligible => "eligible".to_string(),
            Self::Waiting(deps) => format!("waiting on {}", deps.join(", ")),
            Self::Unresolved(deps) => format!("unknown dependencies {}", deps.join(", ")),
        }
    }
}

pub fn eligibility(graph: &DependencyGraph, approved: &HashSet<String>) -> Vec<(String, Eligibility)> {
    graph
        .order()
        .iter()
        .map(|id| {
            let state = if approved.contains(id) {
                Eligibility::Approved
            } else {
                let unresolved = graph.unresolved(id);
                let waiting: Vec<String> = graph
                    .dependencies(id)
                    .iter()
                    .filter(|d| graph.contains(d) && !approved.contains(*d))
                    .cloned()
                    .collect();
                if !unresolved.is_empty() {
                    Eligibility::Unresolved(unresolved)
                } else if !waiting.is_empty() {
                    Eligibility::Waiting(waiting)
                } else {
                    Eligibility::Eligible
                }
            };
            (id.clone(), state)
        })
        .collect()
}

pub fn graph(args: OutputArgs, ctx: &AppContext) -> Result<i32, CliError> {
    let cfg = ctx.cfg();
    let defs = ctx.layout().roster(&cfg.tasks.roster)?;
    let graph = DependencyGraph::build(&defs, cfg.graph.unknown_dependencies)?;
    let probe = build_approval_probe(cfg, ctx.layout());
    let approved: HashSet<String> = graph
        .order()
        .iter()
        .filter(|id| probe.is_approved(id))
        .cloned()
        .collect();
    let states = eligibility(&graph, &approved);
    let cycle = graph.find_cycle();

    if args.json {
        let tasks: Vec<_> = states
            .iter()
            .map(|(id, state)| {
                json!({
                    "id": id,
                    "dependencies": graph.dependencies(id),
                    "state": state.label(),
                })
            })
            .collect();
        let doc = json!({
            "tasks": tasks,
            "layers": graph.layers(),
            "cycle": cycle,
        });
        println!("{}", serde_json::to_string_pretty(&doc).map_err(anyhow::Error::from)?);
        return Ok(EXIT_OK);
    }

    for (id, state) in &states {
        let deps = graph.dependencies(id);
        let deps = if deps.is_empty() {
            "-".to_string()
        } else {
            deps.join(", ")
        };
        println!("{id:<12} <- {deps:<24} {}", state.label());
    }
    for (n, layer) in graph.layers().iter().enumerate() {
        println!("layer {}: {}", n + 1, layer.join(", "));
    }
    if let Some(cycle) = cycle {
        println!("cycle: {}", cycle.join(" -> "));
    }
    Ok(EXIT_OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasegate_core::config::UnknownDependencyPolicy;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_each_task() {
        let docs: Vec<(String, &str)> = vec![
            ("TASK1".into(), ""),
            ("TASK2".into(), "@dependencies TASK1"),
            ("TASK3".into(), "@dependencies TASK2"),
            ("TASK4".into(), "@dependencies TASK9"),
        ];
        let graph = DependencyGraph::from_declarations(&docs, UnknownDependencyPolicy::Preserve)
            .unwrap();
        let approved: HashSet<String> = ["TASK1".to_string()].into();

        let states = eligibility(&graph, &approved);
        assert_eq!(
            states,
            vec![
                ("TASK1".to_string(), Eligibility::Approved),
                ("TASK2".to_string(), Eligibility::Eligible),
                ("TASK3".to_string(), Eligibility::Waiting(vec!["TASK2".into()])),
                ("TASK4".to_string(), Eligibility::Unresolved(vec!["TASK9".into()])),
            ]
        );
    }
}
