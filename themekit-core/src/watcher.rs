//! File watching and change debouncing for watch mode.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use notify::Config as NotifyConfig;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{Error, Result};

/// Recursive filesystem watcher reporting changed paths.
pub struct FileWatcher {
    // Dropping the watcher stops event delivery.
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
}

impl FileWatcher {
    /// Starts watching `root` recursively.
    ///
    /// # Errors
    ///
    /// Returns an `io-failed` watcher error if the platform watcher cannot be
    /// created or `root` cannot be watched.
    pub fn new(root: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::Watch(format!("failed to create watcher: {}", e)))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| Error::Watch(format!("failed to watch {}: {}", root.display(), e)))?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Blocks up to `timeout` for the next change. Access-only events are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an `io-failed` watcher error if the watcher reports one or
    /// its channel is gone.
    pub fn wait_for_event(&mut self, timeout: Duration) -> Result<Option<Vec<PathBuf>>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(Ok(event)) => {
                    if let Some(paths) = changed_paths(event) {
                        return Ok(Some(paths));
                    }
                }
                Ok(Err(e)) => return Err(Error::Watch(format!("watcher error: {}", e))),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Watch("watcher channel disconnected".to_string()))
                }
            }
        }
    }
}

fn changed_paths(event: Event) -> Option<Vec<PathBuf>> {
    match event.kind {
        EventKind::Access(_) => None,
        _ if event.paths.is_empty() => None,
        _ => Some(event.paths),
    }
}

/// Trailing-edge debouncer keyed by watch group.
///
/// Each recorded change pushes the group's deadline out to `at + window`;
/// a group becomes due once no change arrived for a full window. Time is
/// passed in, so the debouncer itself never sleeps.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: IndexMap<String, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: IndexMap::new(),
        }
    }

    pub fn record(&mut self, group: &str, at: Instant) {
        self.pending.insert(group.to_string(), at + self.window);
    }

    /// Removes and returns the groups whose window has elapsed, in the order
    /// they were first recorded.
    pub fn take_due(&mut self, now: Instant) -> Vec<String> {
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(group, _)| group.clone())
            .collect();
        for group in &due {
            self.pending.shift_remove(group);
        }
        due
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_coalesces_into_one() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));

        for offset in [0, 20, 40, 60] {
            debouncer.record("sass", start + Duration::from_millis(offset));
        }

        assert!(debouncer.take_due(start + Duration::from_millis(150)).is_empty());
        assert_eq!(debouncer.take_due(start + Duration::from_millis(160)), vec!["sass"]);
        assert!(debouncer.is_idle());
    }

    #[test]
    fn test_groups_are_independent() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));

        debouncer.record("sass", start);
        debouncer.record("js", start + Duration::from_millis(50));

        assert_eq!(debouncer.next_deadline(), Some(start + Duration::from_millis(100)));
        assert_eq!(debouncer.take_due(start + Duration::from_millis(100)), vec!["sass"]);
        assert_eq!(debouncer.take_due(start + Duration::from_millis(150)), vec!["js"]);
    }
}
