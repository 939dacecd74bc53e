//! Tool adapter contract.

use std::path::Path;

use crate::context::RunContext;
use crate::error::Result;
use crate::fileset::ResolvedSet;
use crate::task::AdapterConfig;

/// Result of one adapter invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Failed { diagnostics: Vec<String> },
}

impl Outcome {
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Outcome::Failed {
            diagnostics: vec![diagnostic.into()],
        }
    }

    /// `Ok` when `diagnostics` is empty, `Failed` otherwise.
    pub fn from_diagnostics(diagnostics: Vec<String>) -> Self {
        if diagnostics.is_empty() {
            Outcome::Ok
        } else {
            Outcome::Failed { diagnostics }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok)
    }
}

/// Runs tasks by name; implemented by the executor.
///
/// Adapters that drive other tasks (the watch loop) reach the executor
/// through this trait.
pub trait TaskRunner {
    fn run_task(&self, invocation: &str) -> Result<()>;
}

/// Everything an adapter may look at while it runs.
pub struct TaskContext<'a> {
    /// The invocation being run, e.g. `sass:compile`.
    pub invocation: &'a str,
    pub run: &'a RunContext,
    pub runner: &'a dyn TaskRunner,
}

impl TaskContext<'_> {
    pub fn src_root(&self) -> std::path::PathBuf {
        self.run.src_root()
    }

    pub fn root(&self) -> &Path {
        self.run.root()
    }
}

/// Uniform wrapper around one external tool.
///
/// Adapters receive their tagged configuration and the resolved file sets of
/// the task. `Err` is reserved for I/O and configuration problems; a tool
/// that ran and rejected its input returns [`Outcome::Failed`].
pub trait ToolAdapter: Send + Sync {
    fn tool(&self) -> &'static str;
    fn run(
        &self,
        config: &AdapterConfig,
        sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome>;
}
