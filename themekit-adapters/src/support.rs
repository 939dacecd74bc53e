//! Small helpers shared by the built-in adapters.

use std::fs;
use std::path::Path;

use themekit_core::error::{Error, Result};
use themekit_core::path_utils::relative_slash;
use themekit_core::task::AdapterConfig;

/// Error for an adapter handed another adapter's configuration.
pub(crate) fn config_mismatch(tool: &str, config: &AdapterConfig) -> Error {
    Error::config(format!(
        "{} adapter cannot run with '{}' configuration",
        tool,
        config.tag()
    ))
}

pub(crate) fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Writes `contents`, creating missing parent directories.
pub(crate) fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| Error::io(path, e))
}

/// `path` relative to `root` for messages, or the full path when it lies
/// elsewhere.
pub(crate) fn display_path(path: &Path, root: &Path) -> String {
    relative_slash(path, root).unwrap_or_else(|| path.display().to_string())
}
