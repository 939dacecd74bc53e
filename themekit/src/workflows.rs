//! The theme's task declarations: leaf tasks, their options and the
//! workflows built from them.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use themekit_adapters::DEFAULT_KEYWORDS;
use themekit_core::config::Config;
use themekit_core::fileset::FileSetPattern;
use themekit_core::options::{
    ArchiveMode, ArchiveOptions, BundleMode, BundleOptions, BundleOutput, CleanOptions,
    CopyOptions, CssMinifyOptions, Devtool, IndentType, JsMinifyOptions, LoaderRule,
    OutputStyle, PotOptions, SassOptions, ScreenOptions, StyleLintOptions, TextDomainOptions,
    WatchGroup, WatchOptions,
};
use themekit_core::path_utils::{relative_slash, trim_dot_slash};
use themekit_core::registry::TaskRegistry;
use themekit_core::reporter::ColorHint;
use themekit_core::task::{AdapterConfig, LeafTask};

/// Sources that never ship in the release.
const COPY_EXCLUDES: &[&str] = &[
    "Gruntfile.js",
    "themekit.toml",
    "package.json",
    "package-lock.json",
    "node_modules/**",
    "**/dev-*/**",
    "**/*-test/**",
    "**/*-beta/**",
    "**/scss/**",
    "**/sass/**",
    "**/src/**",
    "**/.*",
    "**/*.map",
    "**/*.config",
    "tsconfig.json",
    "build-package/**",
    "none",
    "Built",
    "Installable",
];

/// Paths the workflows need, all derived from the project configuration.
struct Layout {
    src_root: PathBuf,
    /// Dist directory relative to the source root, `/`-separated.
    dist: String,
    archive: PathBuf,
}

impl Layout {
    fn new(config: &Config, root: &Path) -> Self {
        let project = &config.project;
        let src_root = project.src_root(root);
        let dist_root = project.dist_root(root);
        let dist = pathdiff::diff_paths(&dist_root, &src_root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|| dist_root.to_string_lossy().into_owned());
        Self {
            src_root,
            dist,
            archive: project.archive_path(root),
        }
    }

    /// `pattern` under the dist directory.
    fn in_dist(&self, pattern: &str) -> String {
        if self.dist.is_empty() {
            pattern.to_string()
        } else {
            format!("{}/{}", self.dist.trim_end_matches('/'), pattern)
        }
    }
}

fn screen(text: String, color: ColorHint) -> LeafTask {
    LeafTask::new(AdapterConfig::Screen(ScreenOptions {
        text,
        color: Some(color),
    }))
}

/// The step standing in for the stylesheet linter.
pub fn lint_step(config: &Config) -> &'static str {
    if config.project.enable_lint {
        "stylelint"
    } else {
        "screen:noLintError"
    }
}

/// Registers every task and workflow of the theme.
pub fn declare(registry: &mut TaskRegistry, config: &Config, root: &Path) {
    let layout = Layout::new(config, root);
    let project = &config.project;
    let lint = lint_step(config);

    registry.register_multi(
        "screen",
        [
            (
                "begin",
                screen(
                    format!(
                        "\n\t# Project   : {}\n\t# Dist      : {}\n\t# Version   : {}",
                        project.name,
                        project.dist_dir.display(),
                        project.version
                    ),
                    ColorHint::Cyan,
                ),
            ),
            (
                "noLintError",
                screen(
                    "\n------------------------------------------------------\n\tLinting is not enabled for this project.\n------------------------------------------------------".to_string(),
                    ColorHint::Red,
                ),
            ),
            (
                "textdomainchecking",
                screen(
                    format!(
                        "\n---------------------------------------------------\n\tChecking textdomain [{}]\n---------------------------------------------------",
                        project.name
                    ),
                    ColorHint::Cyan,
                ),
            ),
            (
                "minifying",
                screen(
                    "\n--------------------------------------\n\tMinifying js & css files.\n---------------------------------------".to_string(),
                    ColorHint::Cyan,
                ),
            ),
            (
                "finish",
                screen(
                    [
                        "",
                        "╭─────────────────────────────────────────────────────────────────╮",
                        "│                                                                 │",
                        "│                      All tasks completed.                       │",
                        "│   Built files & Installable zip copied to the dist directory.   │",
                        "│                                                                 │",
                        "╰─────────────────────────────────────────────────────────────────╯",
                    ]
                    .join("\n"),
                    ColorHint::Green,
                ),
            ),
        ],
    );

    registry.register_multi(
        "sass",
        [(
            "compile",
            LeafTask::new(AdapterConfig::Sass(SassOptions {
                source_map: true,
                indent_type: IndentType::Tab,
                indent_width: 1,
                output_style: OutputStyle::Expanded,
                omit_source_map_url: true,
                force: true,
                load_paths: Vec::new(),
            }))
            .with_files(
                config
                    .files
                    .sass
                    .iter()
                    .map(|set| set.clone().with_ext("scss", "css")),
            ),
        )],
    );

    registry.register_multi("bundle", bundle_targets(config, &layout));

    registry.register_multi(
        "stylelint",
        [(
            "default",
            LeafTask::new(AdapterConfig::StyleLint(StyleLintOptions {
                fix: true,
                config_file: Some(PathBuf::from(".stylelintrc")),
            }))
            .with_file(FileSetPattern::new(
                "",
                ["**/*.scss", "!node_modules/**"],
                "",
            )),
        )],
    );

    registry.register_multi(
        "makepot",
        [(
            "theme",
            LeafTask::new(AdapterConfig::Pot(PotOptions {
                text_domain: project.text_domain().to_string(),
                domain_path: PathBuf::from("languages"),
                package_name: project.name.clone(),
                package_version: project.version.clone(),
                keywords: Vec::new(),
            }))
            .with_file(FileSetPattern::new(
                "",
                [
                    "**/*.php".to_string(),
                    "!node_modules/**".to_string(),
                    format!("!{}", layout.in_dist("**")),
                ],
                "",
            )),
        )],
    );

    registry.register_multi(
        "checktextdomain",
        [(
            "standard",
            LeafTask::new(AdapterConfig::TextDomain(TextDomainOptions {
                text_domain: project.text_domain().to_string(),
                keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
                report_missing: true,
            }))
            .with_file(FileSetPattern::new(
                "",
                [
                    "**/*.php".to_string(),
                    "!node_modules/**".to_string(),
                    format!("!{}", layout.in_dist("**")),
                ],
                "",
            )),
        )],
    );

    registry.register_multi(
        "clean",
        [(
            "dist",
            LeafTask::new(AdapterConfig::Clean(CleanOptions { force: true }))
                .with_files(clean_targets(&layout)),
        )],
    );

    registry.register_multi(
        "copy",
        [(
            "dist",
            LeafTask::new(AdapterConfig::Copy(CopyOptions::default()))
                .with_file(FileSetPattern::new("", copy_sources(&layout), layout.dist.as_str())),
        )],
    );

    registry.register_multi(
        "jsmin",
        [(
            "dist",
            LeafTask::new(AdapterConfig::MinifyJs(JsMinifyOptions::default())).with_file(
                FileSetPattern::new(layout.dist.as_str(), ["**/*.js"], layout.dist.as_str()),
            ),
        )],
    );

    registry.register_multi(
        "cssmin",
        [(
            "dist",
            LeafTask::new(AdapterConfig::MinifyCss(CssMinifyOptions {
                force: true,
                compress: true,
            }))
            .with_file(FileSetPattern::new(
                layout.dist.as_str(),
                ["**/*.css"],
                layout.dist.as_str(),
            )),
        )],
    );

    registry.register_multi(
        "compress",
        [(
            "dist",
            LeafTask::new(AdapterConfig::Archive(ArchiveOptions {
                mode: ArchiveMode::Zip,
                archive: layout.archive.clone(),
                prefix: project.name.clone(),
            }))
            .with_file(FileSetPattern::new(layout.dist.as_str(), ["**"], "")),
        )],
    );

    registry.register_leaf("watch", LeafTask::new(AdapterConfig::Watch(watch_options(config))));

    registry.register_alias("default", ["screen:begin", lint, "sass", "ts", "watch"]);
    registry.register_alias(
        "build",
        [
            "screen:begin",
            lint,
            "sass",
            "ts",
            "makepot",
            "boot",
            "minify",
            "compress",
            "screen:finish",
        ],
    );
    registry.register_alias("boot", ["clean", "copy"]);
    registry.register_alias("minify", ["screen:minifying", "jsmin", "cssmin"]);
    registry.register_alias("ts", ["bundle"]);
    registry.register_alias("textdomain", ["screen:textdomainchecking", "checktextdomain"]);
}

/// One bundle per script entry, named after the entry's file stem.
fn bundle_targets(config: &Config, layout: &Layout) -> Vec<(String, LeafTask)> {
    let mut targets = Vec::new();
    for set in &config.files.ts {
        for src in set.src.iter().filter(|s| !s.starts_with('!')) {
            let entry = layout.src_root.join(&set.cwd).join(trim_dot_slash(src));
            let name = Path::new(src)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| src.clone());
            let options = BundleOptions {
                mode: BundleMode::Production,
                entry,
                output: BundleOutput {
                    path: layout.src_root.join(&set.dest),
                    filename: "index.js".to_string(),
                },
                devtool: Devtool::SourceMap,
                rules: vec![
                    LoaderRule::new(r"\.tsx?$", ["ts-loader"]).exclude("node_modules"),
                    LoaderRule::new(
                        r"(?i)\.s[ac]ss$",
                        ["style-loader", "css-loader", "sass-loader"],
                    ),
                ],
                resolve_extensions: vec![".tsx".to_string(), ".ts".to_string(), ".js".to_string()],
            };
            targets.push((name, LeafTask::new(AdapterConfig::Bundle(options))));
        }
    }
    targets
}

/// The dist directory's contents, then a release archive left by an earlier
/// build.
fn clean_targets(layout: &Layout) -> Vec<FileSetPattern> {
    let mut targets = vec![FileSetPattern::new(layout.dist.as_str(), ["**"], "")];
    if let Some(archive) = relative_slash(&layout.archive, &layout.src_root) {
        targets.push(FileSetPattern::new("", [archive], ""));
    }
    targets
}

fn copy_sources(layout: &Layout) -> Vec<String> {
    let mut src = vec!["**".to_string()];
    src.extend(COPY_EXCLUDES.iter().map(|p| format!("!{}", p)));
    if !layout.dist.starts_with("..") {
        src.push(format!("!{}", layout.in_dist("**")));
    }
    if let Some(archive) = relative_slash(&layout.archive, &layout.src_root) {
        src.push(format!("!{}", archive));
    }
    src
}

fn watch_options(config: &Config) -> WatchOptions {
    let mut groups = IndexMap::new();
    groups.insert(
        "sass".to_string(),
        WatchGroup {
            files: vec!["**/sass/**/*.scss".to_string(), "!node_modules/**".to_string()],
            tasks: vec!["sass".to_string(), lint_step(config).to_string()],
        },
    );
    groups.insert(
        "js".to_string(),
        WatchGroup {
            files: vec![
                "**/src/**/*.{ts,tsx,js}".to_string(),
                "!node_modules/**".to_string(),
            ],
            tasks: vec!["ts".to_string()],
        },
    );
    WatchOptions {
        groups,
        debounce_ms: config.watch.debounce_ms,
        ..WatchOptions::default()
    }
}
