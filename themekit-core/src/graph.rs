//! Static view of the task registry as a petgraph graph.
//!
//! The executor finds problems lazily, for the tasks it is asked to run.
//! [`TaskGraph`] checks every alias up front; the CLI uses it for `--check`.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;

use crate::error::{Error, Result};
use crate::registry::TaskRegistry;
use crate::task::{split_target, TaskDefinition};

/// Alias-to-step edges between registered task names.
#[derive(Debug)]
pub struct TaskGraph {
    graph: DiGraph<String, ()>,
    dangling: Vec<(String, String)>,
}

impl TaskGraph {
    pub fn new(registry: &TaskRegistry) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for name in registry.task_names() {
            let node = graph.add_node(name.clone());
            node_map.insert(name, node);
        }

        let mut dangling = Vec::new();
        let mut aliases: Vec<(&String, &Vec<String>)> = registry
            .iter()
            .filter_map(|(name, def)| match def {
                TaskDefinition::Alias(steps) => Some((name, steps)),
                _ => None,
            })
            .collect();
        aliases.sort_by(|a, b| a.0.cmp(b.0));

        for (name, steps) in aliases {
            let from = node_map[name.as_str()];
            for step in steps {
                let (target_name, target) = split_target(step);
                match (node_map.get(target_name), registry.lookup(target_name)) {
                    (Some(&to), Some(def)) if target_resolves(def, target) => {
                        graph.add_edge(from, to, ());
                    }
                    _ => dangling.push((name.clone(), step.clone())),
                }
            }
        }

        Self { graph, dangling }
    }

    /// Checks that every alias step names a registered task and that no alias
    /// reaches itself.
    ///
    /// # Errors
    ///
    /// The first `unknown-task`, else the first `task-cycle` found.
    pub fn validate(&self) -> Result<()> {
        if let Some((_, step)) = self.dangling.first() {
            return Err(Error::UnknownTask { name: step.clone() });
        }
        if let Some(cycle) = self.cycles().into_iter().next() {
            return Err(Error::TaskCycle { cycle });
        }
        Ok(())
    }

    /// `(alias, step)` pairs whose step does not resolve.
    pub fn dangling(&self) -> &[(String, String)] {
        &self.dangling
    }

    /// Every cycle, each listed from its smallest name and closed with it.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut names: Vec<String> =
                    scc.iter().map(|idx| self.graph[*idx].clone()).collect();
                names.sort();
                let first = names[0].clone();
                names.push(first);
                names
            })
            .collect();
        cycles.sort();
        cycles
    }
}

fn target_resolves(def: &TaskDefinition, target: Option<&str>) -> bool {
    match (def, target) {
        (_, None) => true,
        (TaskDefinition::Multi(targets), Some(t)) => targets.contains_key(t),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ScreenOptions;
    use crate::task::{AdapterConfig, LeafTask};

    fn leaf() -> LeafTask {
        LeafTask::new(AdapterConfig::Screen(ScreenOptions {
            text: "hi".to_string(),
            color: None,
        }))
    }

    #[test]
    fn test_valid_registry() {
        let mut registry = TaskRegistry::new();
        registry.register_multi("screen", [("begin", leaf())]);
        registry.register_alias("default", ["screen:begin"]);

        let graph = TaskGraph::new(&registry);
        assert!(graph.validate().is_ok());
        assert!(graph.dangling().is_empty());
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn test_dangling_target() {
        let mut registry = TaskRegistry::new();
        registry.register_multi("screen", [("begin", leaf())]);
        registry.register_alias("default", ["screen:nope"]);

        let err = TaskGraph::new(&registry).validate().unwrap_err();
        assert_eq!(err.kind(), "unknown-task");
        assert!(err.to_string().contains("screen:nope"));
    }

    #[test]
    fn test_cycle_detected() {
        let mut registry = TaskRegistry::new();
        registry.register_alias("a", ["b"]);
        registry.register_alias("b", ["a"]);

        let graph = TaskGraph::new(&registry);
        assert_eq!(graph.cycles(), vec![vec!["a", "b", "a"]]);
        assert_eq!(graph.validate().unwrap_err().kind(), "task-cycle");
    }

    #[test]
    fn test_self_loop() {
        let mut registry = TaskRegistry::new();
        registry.register_alias("loop", ["loop"]);

        assert_eq!(TaskGraph::new(&registry).cycles(), vec![vec!["loop", "loop"]]);
    }
}
