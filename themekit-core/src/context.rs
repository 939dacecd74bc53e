//! Per-invocation run state.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::ProjectConfig;
use crate::registry::TaskRegistry;
use crate::reporter::Reporter;

/// State shared by every task of one invocation.
pub struct RunContext {
    project: ProjectConfig,
    registry: TaskRegistry,
    reporter: Reporter,
    root: PathBuf,
    interrupted: Arc<AtomicBool>,
    aborted: AtomicBool,
}

impl RunContext {
    pub fn new(
        project: ProjectConfig,
        registry: TaskRegistry,
        reporter: Reporter,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project,
            registry,
            reporter,
            root: root.into(),
            interrupted: Arc::new(AtomicBool::new(false)),
            aborted: AtomicBool::new(false),
        }
    }

    pub fn project(&self) -> &ProjectConfig {
        &self.project
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Working directory every relative configuration path resolves against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src_root(&self) -> PathBuf {
        self.project.src_root(&self.root)
    }

    pub fn dist_root(&self) -> PathBuf {
        self.project.dist_root(&self.root)
    }

    /// Flag shared with the interrupt handler.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Set by the executor when an adapter fails.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Watch mode clears the abort after logging a failed run.
    pub fn clear_abort(&self) {
        self.aborted.store(false, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// True once either an interrupt or a failure has been recorded.
    pub fn is_cancelled(&self) -> bool {
        self.is_interrupted() || self.is_aborted()
    }
}
