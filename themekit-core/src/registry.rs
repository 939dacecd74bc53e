//! Task registry: task names to definitions, adapter tags to handlers.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use crate::adapter::ToolAdapter;
use crate::adapter_registry::AdapterRegistry;
use crate::task::{LeafTask, TaskDefinition};

/// Populated once before execution and read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskDefinition>,
    adapters: AdapterRegistry,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task. An existing definition under the same name is
    /// replaced (last writer wins).
    pub fn register(&mut self, name: &str, definition: TaskDefinition) {
        if self.tasks.insert(name.to_string(), definition).is_some() {
            trace!("Task '{}' redefined", name);
        }
    }

    /// Registers an alias. Steps are not checked here, so aliases may refer
    /// to tasks registered later.
    pub fn register_alias<I, S>(&mut self, name: &str, steps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps = steps.into_iter().map(Into::into).collect();
        self.register(name, TaskDefinition::Alias(steps));
    }

    pub fn register_leaf(&mut self, name: &str, leaf: LeafTask) {
        self.register(name, TaskDefinition::Leaf(leaf));
    }

    pub fn register_multi<I, S>(&mut self, name: &str, targets: I)
    where
        I: IntoIterator<Item = (S, LeafTask)>,
        S: Into<String>,
    {
        let targets: IndexMap<String, LeafTask> =
            targets.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.register(name, TaskDefinition::Multi(targets));
    }

    pub fn register_adapter(&mut self, tag: &str, adapter: Arc<dyn ToolAdapter>) {
        self.adapters.register(tag, adapter);
    }

    pub fn lookup(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.get(name)
    }

    pub fn adapter(&self, tag: &str) -> Option<Arc<dyn ToolAdapter>> {
        self.adapters.get(tag)
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// Registered task names, sorted.
    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &TaskDefinition)> {
        self.tasks.iter()
    }
}
