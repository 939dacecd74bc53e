//! Core library for theme build workflows.

pub mod adapter;
pub mod adapter_registry;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod fileset;
pub mod graph;
pub mod options;
pub mod path_utils;
pub mod registry;
pub mod reporter;
pub mod task;
pub mod watcher;

pub use adapter::{Outcome, TaskContext, TaskRunner, ToolAdapter};
pub use adapter_registry::AdapterRegistry;
pub use config::{Config, ProjectConfig, ProjectFiles, WatchSettings};
pub use context::RunContext;
pub use error::{Error, Result};
pub use executor::{Executor, Invocation};
pub use fileset::{FileSetPattern, GlobList, ResolvedFile, ResolvedSet};
pub use graph::TaskGraph;
pub use registry::TaskRegistry;
pub use reporter::{ColorHint, Level, Reporter};
pub use task::{split_target, AdapterConfig, LeafTask, TaskDefinition};
pub use watcher::{Debouncer, FileWatcher};
