//! Stylesheet compilation with `grass`.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde_json::json;
use tracing::debug;

use themekit_core::adapter::{Outcome, TaskContext, ToolAdapter};
use themekit_core::error::Result;
use themekit_core::fileset::{ResolvedFile, ResolvedSet};
use themekit_core::options::{IndentType, OutputStyle, SassOptions};
use themekit_core::task::AdapterConfig;

use crate::support::{config_mismatch, display_path, write_file};

pub struct SassAdapter;

impl ToolAdapter for SassAdapter {
    fn tool(&self) -> &'static str {
        "sass"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        let AdapterConfig::Sass(options) = config else {
            return Err(config_mismatch(self.tool(), config));
        };
        let reporter = ctx.run.reporter();
        let root = ctx.root();

        let files: Vec<&ResolvedFile> = sets.iter().flat_map(|s| s.files.iter()).collect();
        if files.is_empty() {
            reporter.warn("No stylesheets matched; nothing to compile.");
            return Ok(Outcome::Ok);
        }

        let src_root = ctx.src_root();
        let load_paths: Vec<PathBuf> = options
            .load_paths
            .iter()
            .map(|p| src_root.join(p))
            .collect();

        let compiled: Vec<std::result::Result<String, String>> = files
            .par_iter()
            .map(|file| compile(&file.source, options, &load_paths))
            .collect();

        let mut created = 0usize;
        for (file, result) in files.iter().zip(compiled) {
            match result {
                Ok(css) => {
                    write_outputs(file, &css, options)?;
                    created += 1;
                    reporter.info(&format!(
                        "File {} created.",
                        display_path(&file.destination, root)
                    ));
                }
                Err(message) => {
                    let diagnostic = format!("{}: {}", display_path(&file.source, root), message);
                    if !options.force {
                        return Ok(Outcome::failed(diagnostic));
                    }
                    reporter.warn(&diagnostic);
                }
            }
        }

        debug!("Compiled {} of {} stylesheet(s)", created, files.len());
        Ok(Outcome::Ok)
    }
}

fn compile(
    source: &Path,
    options: &SassOptions,
    load_paths: &[PathBuf],
) -> std::result::Result<String, String> {
    let style = match options.output_style {
        OutputStyle::Expanded => grass::OutputStyle::Expanded,
        OutputStyle::Compressed => grass::OutputStyle::Compressed,
    };
    let grass_options = grass::Options::default()
        .style(style)
        .load_paths(load_paths)
        .quiet(true);

    let css = grass::from_path(source, &grass_options).map_err(|e| e.to_string())?;
    Ok(match options.output_style {
        OutputStyle::Expanded => reindent(&css, &indent_unit(options)),
        OutputStyle::Compressed => css,
    })
}

fn indent_unit(options: &SassOptions) -> String {
    let c = match options.indent_type {
        IndentType::Tab => '\t',
        IndentType::Space => ' ',
    };
    std::iter::repeat(c).take(options.indent_width.max(1)).collect()
}

/// Rewrites the two-space nesting of expanded output into `unit` per level.
pub(crate) fn reindent(css: &str, unit: &str) -> String {
    let mut out = String::with_capacity(css.len());
    for line in css.lines() {
        let trimmed = line.trim_start_matches(' ');
        let spaces = line.len() - trimmed.len();
        for _ in 0..spaces / 2 {
            out.push_str(unit);
        }
        if spaces % 2 == 1 {
            out.push(' ');
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out
}

fn write_outputs(file: &ResolvedFile, css: &str, options: &SassOptions) -> Result<()> {
    let destination = &file.destination;
    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !options.source_map {
        return write_file(destination, css);
    }

    let mut map_path = destination.as_os_str().to_owned();
    map_path.push(".map");
    let map_path = PathBuf::from(map_path);

    // grass does not emit mappings; the map still ties the output to its source.
    let map_dir = destination.parent().unwrap_or_else(|| Path::new("."));
    let source = pathdiff::diff_paths(&file.source, map_dir)
        .unwrap_or_else(|| file.source.clone())
        .to_string_lossy()
        .replace('\\', "/");
    let map = json!({
        "version": 3,
        "file": file_name,
        "sources": [source],
        "names": [],
        "mappings": "",
    });

    let mut output = css.to_string();
    if !options.omit_source_map_url {
        output.push_str(&format!("\n/*# sourceMappingURL={}.map */\n", file_name));
    }

    write_file(destination, output)?;
    write_file(&map_path, map.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reindent_with_tabs() {
        let css = ".a {\n  margin: 1;\n}\n@media print {\n  .b {\n    color: red;\n  }\n}\n";
        let out = reindent(css, "\t");
        assert_eq!(
            out,
            ".a {\n\tmargin: 1;\n}\n@media print {\n\t.b {\n\t\tcolor: red;\n\t}\n}\n"
        );
    }

    #[test]
    fn test_indent_unit() {
        let options = SassOptions {
            indent_type: IndentType::Space,
            indent_width: 4,
            ..SassOptions::default()
        };
        assert_eq!(indent_unit(&options), "    ");
    }
}
