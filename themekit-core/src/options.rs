//! Per-adapter configuration records.
//!
//! Every built-in adapter owns one of these records. They are carried inside
//! [`AdapterConfig`](crate::task::AdapterConfig) so the registry can store
//! any task as a tagged `{tag, config}` pair.

use std::path::PathBuf;

use indexmap::IndexMap;

use crate::reporter::ColorHint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentType {
    Tab,
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    Expanded,
    Compressed,
}

/// Options for compiling `.scss` into `.css`.
#[derive(Debug, Clone, PartialEq)]
pub struct SassOptions {
    /// Write `<output>.map` next to each stylesheet. The map names the
    /// source file only; its `mappings` field is empty because the
    /// compiler reports no positions.
    pub source_map: bool,
    pub indent_type: IndentType,
    pub indent_width: usize,
    pub output_style: OutputStyle,
    pub omit_source_map_url: bool,
    /// Keep compiling the remaining files when one fails.
    pub force: bool,
    pub load_paths: Vec<PathBuf>,
}

impl Default for SassOptions {
    fn default() -> Self {
        Self {
            source_map: false,
            indent_type: IndentType::Space,
            indent_width: 2,
            output_style: OutputStyle::Expanded,
            omit_source_map_url: false,
            force: false,
            load_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleMode {
    Production,
    Development,
}

impl BundleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleMode::Production => "production",
            BundleMode::Development => "development",
        }
    }
}

/// Source-map flavor emitted next to a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Devtool {
    SourceMap,
    InlineSourceMap,
    None,
}

/// Maps files whose path matches `test` to a loader pipeline.
///
/// Loaders run right to left, the way a webpack `use` list does.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderRule {
    pub test: String,
    pub loaders: Vec<String>,
    pub exclude: Option<String>,
}

impl LoaderRule {
    pub fn new<I, S>(test: &str, loaders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            test: test.to_string(),
            loaders: loaders.into_iter().map(Into::into).collect(),
            exclude: None,
        }
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.exclude = Some(pattern.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleOutput {
    pub path: PathBuf,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleOptions {
    pub mode: BundleMode,
    /// Absolute path of the entry module.
    pub entry: PathBuf,
    pub output: BundleOutput,
    pub devtool: Devtool,
    pub rules: Vec<LoaderRule>,
    pub resolve_extensions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleLintOptions {
    /// Rewrite fixable problems in place.
    pub fix: bool,
    /// JSON rule configuration (`.stylelintrc`), relative to the source root.
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsMinifyOptions {
    /// Keep `/*! ... */` license comments.
    pub keep_license_comments: bool,
}

impl Default for JsMinifyOptions {
    fn default() -> Self {
        Self {
            keep_license_comments: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CssMinifyOptions {
    /// Report unparsable files as warnings instead of failing.
    pub force: bool,
    /// Run structural minification (merging rules, shortening values).
    pub compress: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopyOptions {
    pub overwrite: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self { overwrite: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanOptions {
    /// Allow deleting files outside the project root.
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    Zip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveOptions {
    pub mode: ArchiveMode,
    /// Path of the archive to write.
    pub archive: PathBuf,
    /// Directory prepended to every entry inside the archive.
    pub prefix: String,
}

/// gettext template extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct PotOptions {
    pub text_domain: String,
    /// Directory (relative to the source root) the `.pot` file is written to.
    pub domain_path: PathBuf,
    pub package_name: String,
    pub package_version: String,
    /// Keyword specs such as `_x:1,2c,3d`.
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextDomainOptions {
    pub text_domain: String,
    pub keywords: Vec<String>,
    /// Treat calls without a domain argument as errors.
    pub report_missing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenOptions {
    pub text: String,
    pub color: Option<ColorHint>,
}

/// Globs to observe and the tasks to re-run when they change.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchGroup {
    pub files: Vec<String>,
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchOptions {
    pub groups: IndexMap<String, WatchGroup>,
    pub debounce_ms: u64,
    pub poll_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            groups: IndexMap::new(),
            debounce_ms: 100,
            poll_ms: 25,
        }
    }
}
