//! File-set patterns and their resolution into concrete source/destination pairs.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::path_utils::{normalize, relative_slash, trim_dot_slash};

/// Matching rules shared by every glob in the crate.
///
/// Wildcards never match a leading `.` in a path component and never cross
/// a `/`, so `**` skips dotfiles unless a pattern names them explicitly.
pub const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// A `{cwd, src, dest}` triple describing which files a task consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSetPattern {
    /// Base directory the `src` globs are matched under.
    pub cwd: PathBuf,
    /// Ordered glob list. A leading `!` marks a negation.
    pub src: Vec<String>,
    /// Output directory; relative paths under `cwd` are recreated here.
    #[serde(default)]
    pub dest: PathBuf,
    /// Extension rewrites applied to the last extension of each destination.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ext: BTreeMap<String, String>,
}

impl FileSetPattern {
    pub fn new<I, S>(cwd: impl Into<PathBuf>, src: I, dest: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cwd: cwd.into(),
            src: src.into_iter().map(Into::into).collect(),
            dest: dest.into(),
            ext: BTreeMap::new(),
        }
    }

    /// Maps the source extension `from` to `to` in destinations.
    pub fn with_ext(mut self, from: &str, to: &str) -> Self {
        self.ext.insert(
            from.trim_start_matches('.').to_string(),
            to.trim_start_matches('.').to_string(),
        );
        self
    }
}

/// One source file and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Source path relative to the set base, `/`-separated.
    pub relative: String,
}

/// Result of resolving one [`FileSetPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSet {
    pub base: PathBuf,
    pub dest: PathBuf,
    pub files: Vec<ResolvedFile>,
}

impl ResolvedSet {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Compiled positive and negated globs from one `src` list.
#[derive(Debug, Clone)]
pub struct GlobList {
    positive: Vec<Pattern>,
    negative: Vec<Pattern>,
    pruning: Vec<Pattern>,
}

impl GlobList {
    /// Compiles a pattern list, expanding `{a,b}` alternations first.
    ///
    /// # Errors
    ///
    /// Returns `config-invalid` if any pattern is not a valid glob.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut positive = Vec::new();
        let mut negative = Vec::new();
        let mut pruning = Vec::new();

        for raw in patterns {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            let (negated, body) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            for expanded in expand_braces(trim_dot_slash(body)) {
                let pattern = Pattern::new(&expanded)?;
                if negated {
                    if let Some(dir) = expanded.strip_suffix("/**") {
                        pruning.push(Pattern::new(dir)?);
                    }
                    negative.push(pattern);
                } else {
                    positive.push(pattern);
                }
            }
        }

        Ok(Self {
            positive,
            negative,
            pruning,
        })
    }

    /// True when `relative` matches a positive glob and no negation.
    pub fn matches(&self, relative: &str) -> bool {
        self.positive
            .iter()
            .any(|p| p.matches_with(relative, MATCH_OPTIONS))
            && !self.is_excluded(relative)
    }

    pub fn is_excluded(&self, relative: &str) -> bool {
        self.negative
            .iter()
            .any(|p| p.matches_with(relative, MATCH_OPTIONS))
    }

    /// True when a negation of the form `dir/**` rules out everything below
    /// `relative_dir`, so the walk can skip it.
    fn prunes_dir(&self, relative_dir: &str) -> bool {
        self.pruning
            .iter()
            .any(|p| p.matches_with(relative_dir, MATCH_OPTIONS))
    }

    fn positives(&self) -> &[Pattern] {
        &self.positive
    }
}

/// Resolves a file-set pattern anchored at `anchor` (the project source root).
///
/// Files are returned per positive pattern in discovery order, negations
/// removed, duplicates dropped (first occurrence wins). A missing `cwd` or a
/// pattern that matches nothing yields an empty set.
///
/// # Errors
///
/// Returns `config-invalid` for malformed globs and `io-failed` when the
/// directory walk fails.
pub fn resolve(pattern: &FileSetPattern, anchor: &Path) -> Result<ResolvedSet> {
    let base = normalize(&anchor.join(&pattern.cwd));
    let dest = normalize(&anchor.join(&pattern.dest));
    let globs = GlobList::new(&pattern.src)?;

    if !base.is_dir() {
        debug!("File set base {} does not exist", base.display());
        return Ok(ResolvedSet {
            base,
            dest,
            files: Vec::new(),
        });
    }

    let candidates = walk(&base, &globs)?;
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for positive in globs.positives() {
        for relative in &candidates {
            if !positive.matches_with(relative, MATCH_OPTIONS) || globs.is_excluded(relative) {
                continue;
            }
            let source = base.join(relative);
            if !seen.insert(source.clone()) {
                continue;
            }
            let destination = dest.join(apply_ext(relative, &pattern.ext));
            trace!("{} -> {}", source.display(), destination.display());
            files.push(ResolvedFile {
                source,
                destination,
                relative: relative.clone(),
            });
        }
    }

    debug!(
        "Resolved {} file(s) under {} from {:?}",
        files.len(),
        base.display(),
        pattern.src
    );

    Ok(ResolvedSet { base, dest, files })
}

fn walk(base: &Path, globs: &GlobList) -> Result<Vec<String>> {
    let mut relatives = Vec::new();
    let walker = WalkDir::new(base)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            match relative_slash(entry.path(), base) {
                Some(rel) => !globs.prunes_dir(&rel),
                None => true,
            }
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base.to_path_buf());
            match e.into_io_error() {
                Some(io) => Error::io(path, io),
                None => Error::Io {
                    path,
                    source: std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"),
                },
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(rel) = relative_slash(entry.path(), base) {
            relatives.push(rel);
        }
    }

    Ok(relatives)
}

fn apply_ext(relative: &str, ext: &BTreeMap<String, String>) -> String {
    if ext.is_empty() {
        return relative.to_string();
    }
    let (dir, file) = match relative.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, relative),
    };
    let renamed = match file.rsplit_once('.') {
        Some((stem, current)) if !stem.is_empty() => match ext.get(current) {
            Some(replacement) => format!("{}.{}", stem, replacement),
            None => file.to_string(),
        },
        _ => file.to_string(),
    };
    match dir {
        Some(dir) => format!("{}/{}", dir, renamed),
        None => renamed,
    }
}

/// Expands shell-style `{a,b}` alternations into separate patterns.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0usize;
    let mut close = None;
    let mut commas = Vec::new();
    for (offset, c) in pattern[open..].char_indices() {
        let index = open + offset;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(index);
                    break;
                }
            }
            ',' if depth == 1 => commas.push(index),
            _ => {}
        }
    }

    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    if commas.is_empty() {
        let head = &pattern[..=close];
        return expand_braces(&pattern[close + 1..])
            .into_iter()
            .map(|tail| format!("{}{}", head, tail))
            .collect();
    }

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut bounds = Vec::with_capacity(commas.len() + 2);
    bounds.push(open);
    bounds.extend(commas);
    bounds.push(close);

    bounds
        .windows(2)
        .flat_map(|w| {
            let alternative = &pattern[w[0] + 1..w[1]];
            expand_braces(&format!("{}{}{}", prefix, alternative, suffix))
        })
        .collect()
}
