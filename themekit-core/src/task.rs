//! Task definitions stored in the registry.

use indexmap::IndexMap;

use crate::fileset::FileSetPattern;
use crate::options::{
    ArchiveOptions, BundleOptions, CleanOptions, CopyOptions, CssMinifyOptions, JsMinifyOptions,
    PotOptions, SassOptions, ScreenOptions, StyleLintOptions, TextDomainOptions, WatchOptions,
};

/// Adapter-specific configuration, tagged by the adapter it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterConfig {
    Sass(SassOptions),
    Bundle(BundleOptions),
    StyleLint(StyleLintOptions),
    MinifyJs(JsMinifyOptions),
    MinifyCss(CssMinifyOptions),
    Copy(CopyOptions),
    Clean(CleanOptions),
    Archive(ArchiveOptions),
    Pot(PotOptions),
    TextDomain(TextDomainOptions),
    Screen(ScreenOptions),
    Watch(WatchOptions),
    /// Free-form configuration for adapters registered outside this crate.
    Custom { tag: String, value: toml::Value },
}

impl AdapterConfig {
    /// Registry tag of the adapter that consumes this configuration.
    pub fn tag(&self) -> &str {
        match self {
            AdapterConfig::Sass(_) => "sass",
            AdapterConfig::Bundle(_) => "bundle",
            AdapterConfig::StyleLint(_) => "stylelint",
            AdapterConfig::MinifyJs(_) => "jsmin",
            AdapterConfig::MinifyCss(_) => "cssmin",
            AdapterConfig::Copy(_) => "copy",
            AdapterConfig::Clean(_) => "clean",
            AdapterConfig::Archive(_) => "compress",
            AdapterConfig::Pot(_) => "makepot",
            AdapterConfig::TextDomain(_) => "checktextdomain",
            AdapterConfig::Screen(_) => "screen",
            AdapterConfig::Watch(_) => "watch",
            AdapterConfig::Custom { tag, .. } => tag,
        }
    }
}

/// A task that dispatches to a single adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafTask {
    pub adapter: String,
    pub config: AdapterConfig,
    pub files: Vec<FileSetPattern>,
}

impl LeafTask {
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            adapter: config.tag().to_string(),
            config,
            files: Vec::new(),
        }
    }

    pub fn with_file(mut self, pattern: FileSetPattern) -> Self {
        self.files.push(pattern);
        self
    }

    pub fn with_files(mut self, patterns: impl IntoIterator<Item = FileSetPattern>) -> Self {
        self.files.extend(patterns);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskDefinition {
    Leaf(LeafTask),
    /// Ordered list of other task names, resolved at execution time.
    Alias(Vec<String>),
    /// Named targets run in declared order, or one at a time as `name:target`.
    Multi(IndexMap<String, LeafTask>),
}

impl TaskDefinition {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskDefinition::Leaf(_) => "leaf",
            TaskDefinition::Alias(_) => "alias",
            TaskDefinition::Multi(_) => "multi",
        }
    }

    /// One-line summary for task listings.
    pub fn describe(&self) -> String {
        match self {
            TaskDefinition::Leaf(leaf) => leaf.adapter.clone(),
            TaskDefinition::Alias(steps) => steps.join(", "),
            TaskDefinition::Multi(targets) => targets.keys().cloned().collect::<Vec<_>>().join(", "),
        }
    }
}

/// Splits `name:target` into its parts.
pub fn split_target(invocation: &str) -> (&str, Option<&str>) {
    match invocation.split_once(':') {
        Some((name, target)) => (name, Some(target)),
        None => (invocation, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("screen:begin"), ("screen", Some("begin")));
        assert_eq!(split_target("build"), ("build", None));
    }

    #[test]
    fn test_leaf_takes_tag_from_config() {
        let leaf = LeafTask::new(AdapterConfig::Clean(CleanOptions::default()));
        assert_eq!(leaf.adapter, "clean");
    }
}
