//! Shared path utilities for file-set resolution and watching.

use std::path::{Component, Path, PathBuf};

/// Lexically normalizes a path.
///
/// Removes `.` components and folds `..` into the preceding component
/// without touching the filesystem, so it also works for paths that do
/// not exist yet (output directories, archives).
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match out.components().next_back() {
                    Some(Component::Normal(_)) => out.pop(),
                    _ => false,
                };
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Returns `path` relative to `base` with `/` separators.
///
/// Glob patterns are written with forward slashes, so every path handed to
/// a matcher goes through here first. Returns `None` when `path` is not
/// below `base`.
pub fn relative_slash(path: &Path, base: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

/// Strips a leading `./` from a pattern-like string.
pub fn trim_dot_slash(value: &str) -> &str {
    let mut value = value;
    while let Some(rest) = value.strip_prefix("./") {
        value = rest;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_removes_cur_dir() {
        assert_eq!(normalize(Path::new("/a/./b/./")), PathBuf::from("/a/b"));
        assert_eq!(normalize(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn test_normalize_folds_parent_dir() {
        assert_eq!(normalize(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_relative_slash() {
        let base = Path::new("/root/theme");
        assert_eq!(
            relative_slash(Path::new("/root/theme/sass/a.scss"), base).as_deref(),
            Some("sass/a.scss")
        );
        assert_eq!(relative_slash(Path::new("/elsewhere/a"), base), None);
    }

    #[test]
    fn test_trim_dot_slash() {
        assert_eq!(trim_dot_slash("./././build/"), "build/");
        assert_eq!(trim_dot_slash("sass/"), "sass/");
    }
}
