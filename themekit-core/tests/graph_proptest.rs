use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use themekit_core::adapter::{Outcome, TaskContext, ToolAdapter};
use themekit_core::config::ProjectConfig;
use themekit_core::context::RunContext;
use themekit_core::executor::Executor;
use themekit_core::fileset::ResolvedSet;
use themekit_core::graph::TaskGraph;
use themekit_core::registry::TaskRegistry;
use themekit_core::reporter::Reporter;
use themekit_core::task::{AdapterConfig, LeafTask};
use themekit_core::Result;

const ALIASES: [&str; 5] = ["a", "b", "c", "d", "e"];

struct NoopAdapter;

impl ToolAdapter for NoopAdapter {
    fn tool(&self) -> &'static str {
        "noop"
    }

    fn run(&self, _: &AdapterConfig, _: &[ResolvedSet], _: &TaskContext<'_>) -> Result<Outcome> {
        Ok(Outcome::Ok)
    }
}

/// Five aliases whose steps pick among the aliases and one leaf (`work`).
fn gen_steps() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(0usize..=ALIASES.len(), 0..4), ALIASES.len())
}

fn build_registry(steps: &[Vec<usize>]) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register_adapter("noop", Arc::new(NoopAdapter));
    registry.register_leaf(
        "work",
        LeafTask::new(AdapterConfig::Custom {
            tag: "noop".to_string(),
            value: toml::Value::Boolean(true),
        }),
    );
    for (name, picks) in ALIASES.iter().zip(steps) {
        let names: Vec<&str> = picks
            .iter()
            .map(|&i| ALIASES.get(i).copied().unwrap_or("work"))
            .collect();
        registry.register_alias(name, names);
    }
    registry
}

proptest! {
    #[test]
    fn test_cycles_match_execution(steps in gen_steps()) {
        let registry = build_registry(&steps);
        let cyclic: HashSet<String> = TaskGraph::new(&registry)
            .cycles()
            .into_iter()
            .flatten()
            .collect();

        let ctx = RunContext::new(
            ProjectConfig::default(),
            registry,
            Reporter::memory().0,
            std::env::temp_dir(),
        );
        let executor = Executor::new(&ctx);
        for name in ALIASES {
            let before = executor.invocations();
            match executor.run_task(name) {
                Err(e) => {
                    prop_assert_eq!(e.kind(), "task-cycle");
                    prop_assert_eq!(executor.invocations(), before);
                }
                Ok(()) => prop_assert!(!cyclic.contains(name)),
            }
        }
    }

    #[test]
    fn test_acyclic_graphs_validate(steps in gen_steps()) {
        let registry = build_registry(&steps);
        let graph = TaskGraph::new(&registry);
        prop_assert!(graph.dangling().is_empty());
        match graph.validate() {
            Ok(()) => prop_assert!(graph.cycles().is_empty()),
            Err(e) => {
                prop_assert_eq!(e.kind(), "task-cycle");
                prop_assert!(!graph.cycles().is_empty());
            }
        }
    }
}
