//! TOML configuration parsing for the project definition.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::fileset::FileSetPattern;
use crate::path_utils::normalize;

/// Project settings, fixed for the duration of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name; doubles as the gettext text domain.
    pub name: String,
    pub src_dir: PathBuf,
    pub dist_dir: PathBuf,
    /// Run the stylesheet linter in workflows instead of the notice banner.
    pub enable_lint: bool,
    pub version: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "bagan-html".to_string(),
            src_dir: PathBuf::from("./"),
            dist_dir: PathBuf::from("./build/"),
            enable_lint: false,
            version: "1.0.0".to_string(),
        }
    }
}

impl ProjectConfig {
    pub fn text_domain(&self) -> &str {
        &self.name
    }

    /// Absolute source directory; every relative path in task configuration
    /// resolves against it.
    pub fn src_root(&self, root: &Path) -> PathBuf {
        normalize(&root.join(&self.src_dir))
    }

    pub fn dist_root(&self, root: &Path) -> PathBuf {
        normalize(&root.join(&self.dist_dir))
    }

    /// Release archive, written next to the dist directory.
    pub fn archive_path(&self, root: &Path) -> PathBuf {
        let dist = self.dist_root(root);
        let parent = dist.parent().map(Path::to_path_buf).unwrap_or(dist);
        parent.join(format!("{}-{}.zip", self.name, self.version))
    }

    /// # Errors
    ///
    /// Returns `config-invalid` for an empty or path-like name, or a version
    /// that is not semver.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("project name must not be empty"));
        }
        if self.name.contains(['/', '\\']) {
            return Err(Error::config(format!(
                "project name '{}' must not contain path separators",
                self.name
            )));
        }
        semver::Version::parse(&self.version).map_err(|e| {
            Error::config(format!("project version '{}' is not semver: {}", self.version, e))
        })?;
        Ok(())
    }
}

/// Source file sets feeding the stylesheet and script tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectFiles {
    pub sass: Vec<FileSetPattern>,
    pub ts: Vec<FileSetPattern>,
}

impl Default for ProjectFiles {
    fn default() -> Self {
        Self {
            sass: vec![FileSetPattern::new(
                "sass/",
                ["master.scss", "!_*.scss"],
                "css/",
            )],
            ts: vec![FileSetPattern::new("src/", ["master.js"], "js/")],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    pub debounce_ms: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

/// Contents of `themekit.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub files: ProjectFiles,
    pub watch: WatchSettings,
}

impl Config {
    pub const FILE_NAME: &'static str = "themekit.toml";

    /// Parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `io-failed` if the file cannot be read and `config-invalid` if
    /// it does not parse or validate.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Config = toml::from_str(&content).map_err(|error| Error::Toml {
            error,
            context: path.display().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `explicit` if given, else `themekit.toml` under `root` when it
    /// exists, else the built-in defaults.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(&root.join(path));
        }
        let candidate = root.join(Self::FILE_NAME);
        if candidate.is_file() {
            debug!("Loading {}", candidate.display());
            return Self::load(&candidate);
        }
        debug!("No {} found, using defaults", Self::FILE_NAME);
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `config-invalid` if the project section is invalid or a file
    /// set has no patterns.
    pub fn validate(&self) -> Result<()> {
        self.project.validate()?;
        for (group, sets) in [("sass", &self.files.sass), ("ts", &self.files.ts)] {
            if let Some(empty) = sets.iter().find(|s| s.src.is_empty()) {
                return Err(Error::config(format!(
                    "file set '{}' under {} has no src patterns",
                    group,
                    empty.cwd.display()
                )));
            }
        }
        if self.watch.debounce_ms == 0 {
            return Err(Error::config("watch.debounce_ms must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_path_sits_next_to_dist() {
        let project = ProjectConfig::default();
        let archive = project.archive_path(Path::new("/work/theme"));
        assert_eq!(archive, PathBuf::from("/work/theme/bagan-html-1.0.0.zip"));
    }

    #[test]
    fn test_roots_are_normalized() {
        let project = ProjectConfig::default();
        let root = Path::new("/work/theme");
        assert_eq!(project.src_root(root), PathBuf::from("/work/theme"));
        assert_eq!(project.dist_root(root), PathBuf::from("/work/theme/build"));
    }

    #[test]
    fn test_rejects_bad_version() {
        let project = ProjectConfig {
            version: "one".to_string(),
            ..ProjectConfig::default()
        };
        assert_eq!(project.validate().unwrap_err().kind(), "config-invalid");
    }
}
