//! Registry for tool adapters to support plugin-like extensibility.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::ToolAdapter;

/// Maps adapter tags to their handlers.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ToolAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under `tag`, replacing any previous one.
    ///
    /// # Arguments
    ///
    /// * `tag` - The adapter tag tasks refer to (e.g., "sass", "compress")
    /// * `adapter` - The handler invoked for leaf tasks with that tag
    pub fn register(&mut self, tag: &str, adapter: Arc<dyn ToolAdapter>) {
        self.adapters.insert(tag.to_string(), adapter);
    }

    /// Gets the handler for a tag.
    ///
    /// Returns `None` if no adapter is registered for the tag.
    pub fn get(&self, tag: &str) -> Option<Arc<dyn ToolAdapter>> {
        self.adapters.get(tag).cloned()
    }

    /// Lists all registered tags, sorted.
    pub fn registered_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.adapters.keys().cloned().collect();
        tags.sort();
        tags
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("tags", &self.registered_tags())
            .finish()
    }
}
