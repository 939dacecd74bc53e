//! Watch mode: re-run task groups when their files change.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use themekit_core::adapter::{Outcome, TaskContext, ToolAdapter};
use themekit_core::error::{Error, Result};
use themekit_core::fileset::{GlobList, ResolvedSet};
use themekit_core::path_utils::relative_slash;
use themekit_core::task::AdapterConfig;
use themekit_core::watcher::{Debouncer, FileWatcher};

use crate::support::config_mismatch;

struct Group {
    name: String,
    globs: GlobList,
    tasks: Vec<String>,
}

/// Runs until interrupted; returns `Err(Cancelled)` then.
pub struct WatchAdapter;

impl ToolAdapter for WatchAdapter {
    fn tool(&self) -> &'static str {
        "watch"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        _sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        let AdapterConfig::Watch(options) = config else {
            return Err(config_mismatch(self.tool(), config));
        };
        let groups = options
            .groups
            .iter()
            .map(|(name, group)| {
                Ok(Group {
                    name: name.clone(),
                    globs: GlobList::new(&group.files)?,
                    tasks: group.tasks.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let src_root = ctx.src_root();
        let reporter = ctx.run.reporter();

        for group in &groups {
            run_group(group, ctx)?;
        }

        let mut watcher = FileWatcher::new(&src_root)?;
        let watch_root = src_root.canonicalize().unwrap_or_else(|_| src_root.clone());
        let mut debouncer = Debouncer::new(Duration::from_millis(options.debounce_ms));
        let poll = Duration::from_millis(options.poll_ms.max(1));
        reporter.info("Waiting...");

        loop {
            if ctx.run.is_interrupted() {
                debug!("Watch loop interrupted");
                return Err(Error::Cancelled);
            }

            let timeout = debouncer
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()).min(poll))
                .unwrap_or(poll);

            if let Some(paths) = watcher.wait_for_event(timeout)? {
                let now = Instant::now();
                for path in paths {
                    let Some(relative) = relative_to(&path, &watch_root, &src_root) else {
                        continue;
                    };
                    for group in groups.iter().filter(|g| g.globs.matches(&relative)) {
                        trace!("{} matched group '{}'", relative, group.name);
                        if debouncer.is_idle() {
                            reporter.info(&format!(">> File \"{}\" changed.", relative));
                        }
                        debouncer.record(&group.name, now);
                    }
                }
            }

            let due = debouncer.take_due(Instant::now());
            if due.is_empty() {
                continue;
            }
            for name in due {
                if let Some(group) = groups.iter().find(|g| g.name == name) {
                    run_group(group, ctx)?;
                }
            }
            reporter.info("Waiting...");
        }
    }
}

fn relative_to(path: &Path, watch_root: &Path, src_root: &Path) -> Option<String> {
    relative_slash(path, watch_root).or_else(|| relative_slash(path, src_root))
}

/// Runs the group's tasks in order. A failure is reported and ends this
/// run of the group only; an interrupt ends the watch.
fn run_group(group: &Group, ctx: &TaskContext<'_>) -> Result<()> {
    debug!("Running watch group '{}'", group.name);
    for task in &group.tasks {
        match ctx.runner.run_task(task) {
            Ok(()) => {}
            Err(Error::Cancelled) if ctx.run.is_interrupted() => return Err(Error::Cancelled),
            Err(e) => {
                ctx.run.reporter().error(&e.to_string());
                ctx.run.clear_abort();
                break;
            }
        }
    }
    Ok(())
}
