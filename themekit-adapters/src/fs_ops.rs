//! Copying and deleting resolved files.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, trace};

use themekit_core::adapter::{Outcome, TaskContext, ToolAdapter};
use themekit_core::error::{Error, Result};
use themekit_core::fileset::{ResolvedFile, ResolvedSet};
use themekit_core::task::AdapterConfig;

use crate::support::{config_mismatch, display_path};

pub struct CopyAdapter;

impl ToolAdapter for CopyAdapter {
    fn tool(&self) -> &'static str {
        "copy"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        let AdapterConfig::Copy(options) = config else {
            return Err(config_mismatch(self.tool(), config));
        };
        let files: Vec<&ResolvedFile> = sets.iter().flat_map(|s| s.files.iter()).collect();

        let copied: Vec<Result<bool>> = files
            .par_iter()
            .map(|file| copy_one(file, options.overwrite))
            .collect();

        let mut count = 0usize;
        for (file, result) in files.iter().zip(copied) {
            if result? {
                count += 1;
                trace!("Copied {}", file.relative);
            }
        }

        let skipped = files.len() - count;
        if skipped > 0 {
            debug!("Skipped {} existing file(s)", skipped);
        }
        ctx.run
            .reporter()
            .ok(&format!("Copied {} file(s).", count));
        Ok(Outcome::Ok)
    }
}

/// Returns `false` when an existing destination was kept.
fn copy_one(file: &ResolvedFile, overwrite: bool) -> Result<bool> {
    if !overwrite && file.destination.exists() {
        return Ok(false);
    }
    if let Some(parent) = file.destination.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::copy(&file.source, &file.destination).map_err(|e| Error::io(&file.source, e))?;
    Ok(true)
}

pub struct CleanAdapter;

impl ToolAdapter for CleanAdapter {
    fn tool(&self) -> &'static str {
        "clean"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        let AdapterConfig::Clean(options) = config else {
            return Err(config_mismatch(self.tool(), config));
        };
        let root = ctx.root();

        if !options.force {
            let outside: Vec<String> = sets
                .iter()
                .flat_map(|s| s.files.iter())
                .filter(|f| !f.source.starts_with(root))
                .map(|f| {
                    format!(
                        "Cannot delete files outside the current working directory: {}",
                        f.source.display()
                    )
                })
                .collect();
            if !outside.is_empty() {
                return Ok(Outcome::Failed {
                    diagnostics: outside,
                });
            }
        }

        let mut deleted = 0usize;
        for set in sets {
            let mut dirs = BTreeSet::new();
            for file in &set.files {
                match fs::remove_file(&file.source) {
                    Ok(()) => deleted += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(Error::io(&file.source, e)),
                }
                trace!("Deleted {}", display_path(&file.source, root));
                let mut dir = file.source.parent();
                while let Some(d) = dir {
                    if d == set.base || !d.starts_with(&set.base) {
                        break;
                    }
                    dirs.insert(d.to_path_buf());
                    dir = d.parent();
                }
            }
            prune_empty_dirs(dirs)?;
        }

        ctx.run
            .reporter()
            .ok(&format!("{} path(s) cleaned.", deleted));
        Ok(Outcome::Ok)
    }
}

/// Removes the directories that ended up empty, deepest first.
fn prune_empty_dirs(dirs: BTreeSet<PathBuf>) -> Result<()> {
    let mut ordered: Vec<PathBuf> = dirs.into_iter().collect();
    ordered.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    for dir in ordered {
        if is_empty_dir(&dir) {
            fs::remove_dir(&dir).map_err(|e| Error::io(&dir, e))?;
        }
    }
    Ok(())
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_keeps_non_empty() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = a.join("b");
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("keep.txt"), "x").unwrap();

        prune_empty_dirs([a.clone(), b.clone()].into_iter().collect()).unwrap();
        assert!(!b.exists());
        assert!(a.exists());
    }

    #[test]
    fn test_copy_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.txt");
        let destination = dir.path().join("out/dst.txt");
        fs::write(&source, "new").unwrap();
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, "old").unwrap();

        let file = ResolvedFile {
            source,
            destination: destination.clone(),
            relative: "src.txt".to_string(),
        };
        assert!(!copy_one(&file, false).unwrap());
        assert_eq!(fs::read_to_string(&destination).unwrap(), "old");
        assert!(copy_one(&file, true).unwrap());
        assert_eq!(fs::read_to_string(&destination).unwrap(), "new");
    }
}
