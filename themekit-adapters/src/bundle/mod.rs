//! In-process module bundler.
//!
//! Starting at the entry, every relative `import`/`export ... from`/`require`
//! is resolved, run through the loader pipeline of its rule and rewritten
//! into a small CommonJS runtime. The bundle keeps each module's lines
//! intact so the emitted source map can stay line-granular.

mod loaders;
mod rewrite;
mod sourcemap;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose;
use base64::Engine;
use indexmap::IndexMap;
use tracing::{debug, trace};

use themekit_core::adapter::{Outcome, TaskContext, ToolAdapter};
use themekit_core::error::{Error, Result};
use themekit_core::fileset::ResolvedSet;
use themekit_core::options::{BundleMode, BundleOptions, Devtool};
use themekit_core::path_utils::normalize;
use themekit_core::task::AdapterConfig;

use crate::support::{config_mismatch, display_path, write_file};

use loaders::CompiledRule;
use rewrite::{ModuleRewriter, RewrittenModule};
use sourcemap::SourceMapBuilder;

const RUNTIME_HEAD: &str = "(function () {\n\"use strict\";\nvar __themekit_modules__ = {";

const RUNTIME_TAIL: &str = r#"};
var __themekit_cache__ = {};
function __themekit_require__(id) {
  var cached = __themekit_cache__[id];
  if (cached) return cached.exports;
  var module = (__themekit_cache__[id] = { exports: {} });
  __themekit_modules__[id].call(module.exports, module, module.exports);
  return module.exports;
}
function __themekit_default__(m) {
  return m && m.__esModule ? m.default : m;
}
function __themekit_export__(target, getters) {
  Object.defineProperty(target, "__esModule", { value: true });
  for (var key in getters) {
    Object.defineProperty(target, key, { enumerable: true, get: getters[key] });
  }
}
function __themekit_star__(target, source) {
  Object.keys(source).forEach(function (key) {
    if (key === "default" || Object.prototype.hasOwnProperty.call(target, key)) return;
    Object.defineProperty(target, key, { enumerable: true, get: function () { return source[key]; } });
  });
}
__themekit_require__(0);
})();"#;

pub struct BundleAdapter;

impl ToolAdapter for BundleAdapter {
    fn tool(&self) -> &'static str {
        "bundle"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        _sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        let AdapterConfig::Bundle(options) = config else {
            return Err(config_mismatch(self.tool(), config));
        };
        let root = ctx.root();
        let rules = options
            .rules
            .iter()
            .map(CompiledRule::new)
            .collect::<Result<Vec<_>>>()?;
        let rewriter = ModuleRewriter::new()?;

        let graph = match ModuleGraph::build(options, &rules, &rewriter, root)? {
            Ok(graph) => graph,
            Err(diagnostics) => return Ok(Outcome::Failed { diagnostics }),
        };

        let output = options.output.path.join(&options.output.filename);
        let bundle = graph.emit(options, &rewriter, root, &options.output.filename);
        write_file(&output, &bundle.code)?;
        ctx.run.reporter().info(&format!(
            "asset {} {} bytes [emitted]",
            options.output.filename,
            bundle.code.len()
        ));

        if let Some(map) = bundle.map {
            let map_name = format!("{}.map", options.output.filename);
            write_file(&options.output.path.join(&map_name), &map)?;
            ctx.run.reporter().info(&format!(
                "asset {} {} bytes [emitted]",
                map_name,
                map.len()
            ));
        }

        debug!(
            "Bundled {} module(s) from {} into {}",
            graph.modules.len(),
            options.entry.display(),
            output.display()
        );
        Ok(Outcome::Ok)
    }
}

struct Module {
    /// Source as read from disk.
    original: String,
    /// Source after the loader pipeline.
    loaded: String,
    /// Specifier to module id.
    ids: HashMap<String, usize>,
}

struct ModuleGraph {
    modules: IndexMap<PathBuf, Module>,
}

struct Bundle {
    code: String,
    map: Option<String>,
}

impl ModuleGraph {
    /// Loads the entry and everything it reaches. The inner `Err` carries
    /// build diagnostics; the outer one I/O failures.
    fn build(
        options: &BundleOptions,
        rules: &[CompiledRule],
        rewriter: &ModuleRewriter,
        root: &Path,
    ) -> Result<std::result::Result<Self, Vec<String>>> {
        let entry = normalize(&options.entry);
        if !entry.is_file() {
            let dir = entry.parent().unwrap_or(root);
            return Ok(Err(vec![format!(
                "Module not found: Error: Can't resolve '{}' in '{}'",
                display_path(&entry, root),
                dir.display()
            )]));
        }

        let mut modules: IndexMap<PathBuf, Module> = IndexMap::new();
        let mut pending: Vec<PathBuf> = vec![entry];
        let mut diagnostics = Vec::new();
        let mut next = 0usize;

        while next < pending.len() {
            let path = pending[next].clone();
            next += 1;

            let original = std::fs::read_to_string(&path)
                .map_err(|e| Error::io(&path, e))?;
            let loaded = match loaders::load(rules, &path, original.clone()) {
                Ok(loaded) => loaded,
                Err(message) => {
                    diagnostics.push(format!(
                        "ERROR in {}: Module build failed: {}",
                        display_path(&path, root),
                        message
                    ));
                    continue;
                }
            };

            let dir = path.parent().unwrap_or(root).to_path_buf();
            let mut ids = HashMap::new();
            for spec in rewriter.dependencies(&loaded) {
                let Some(resolved) = resolve(&spec, &dir, &options.resolve_extensions) else {
                    diagnostics.push(format!(
                        "ERROR in {}: Module not found: Error: Can't resolve '{}' in '{}'",
                        display_path(&path, root),
                        spec,
                        dir.display()
                    ));
                    continue;
                };
                let id = match pending.iter().position(|p| *p == resolved) {
                    Some(id) => id,
                    None => {
                        trace!("{} -> {}", spec, resolved.display());
                        pending.push(resolved);
                        pending.len() - 1
                    }
                };
                ids.insert(spec, id);
            }

            modules.insert(
                path,
                Module {
                    original,
                    loaded,
                    ids,
                },
            );
        }

        if diagnostics.is_empty() {
            Ok(Ok(Self { modules }))
        } else {
            Ok(Err(diagnostics))
        }
    }

    /// Module ids are positions in discovery order; the entry is 0.
    fn emit(
        &self,
        options: &BundleOptions,
        rewriter: &ModuleRewriter,
        root: &Path,
        filename: &str,
    ) -> Bundle {
        let mut code = String::new();
        let mut map = SourceMapBuilder::new();

        for line in RUNTIME_HEAD.lines() {
            push_unmapped(&mut code, &mut map, line);
        }

        for (id, (path, module)) in self.modules.iter().enumerate() {
            let name = display_path(path, root);
            let source = map.add_source(name.clone(), module.original.clone());
            let original_lines = module.original.lines().count();
            let RewrittenModule {
                code: body,
                esm,
                exports,
            } = rewriter.rewrite(&module.loaded, &module.ids, options.mode.as_str());

            let mut header = format!("{}: function (module, exports) {{", id);
            if esm {
                let getters: Vec<String> = exports
                    .iter()
                    .map(|(exported, local)| format!("{}: () => {}", quote_key(exported), local))
                    .collect();
                header.push_str(&format!(" __themekit_export__(exports, {{ {} }});", getters.join(", ")));
            }
            if options.mode == BundleMode::Development {
                header.push_str(&format!(" /* {} */", name));
            }
            push_unmapped(&mut code, &mut map, &header);

            for (i, line) in body.lines().enumerate() {
                code.push_str(line);
                code.push('\n');
                if i < original_lines {
                    map.mapped_line(source, i);
                } else {
                    map.unmapped_line();
                }
            }
            push_unmapped(&mut code, &mut map, "},");
        }

        for line in RUNTIME_TAIL.lines() {
            push_unmapped(&mut code, &mut map, line);
        }

        let map = match options.devtool {
            Devtool::None => None,
            Devtool::SourceMap => {
                code.push_str(&format!("//# sourceMappingURL={}.map\n", filename));
                Some(map.to_json(filename))
            }
            Devtool::InlineSourceMap => {
                let encoded = general_purpose::STANDARD.encode(map.to_json(filename));
                code.push_str(&format!(
                    "//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}\n",
                    encoded
                ));
                None
            }
        };

        Bundle { code, map }
    }
}

fn push_unmapped(code: &mut String, map: &mut SourceMapBuilder, line: &str) {
    code.push_str(line);
    code.push('\n');
    map.unmapped_line();
}

fn quote_key(name: &str) -> String {
    if name == "default" {
        "\"default\"".to_string()
    } else {
        name.to_string()
    }
}

/// Resolves a relative specifier against `dir`: the exact file, then each
/// extension, then an index file in a directory of that name.
fn resolve(spec: &str, dir: &Path, extensions: &[String]) -> Option<PathBuf> {
    if !(spec.starts_with("./") || spec.starts_with("../") || spec.starts_with('/')) {
        return None;
    }
    let base = normalize(&dir.join(spec));
    if base.is_file() {
        return Some(base);
    }

    let with_ext = |path: &Path, ext: &str| {
        let mut raw = path.as_os_str().to_owned();
        if !ext.starts_with('.') {
            raw.push(".");
        }
        raw.push(ext);
        PathBuf::from(raw)
    };

    extensions
        .iter()
        .map(|ext| with_ext(&base, ext))
        .chain(extensions.iter().map(|ext| with_ext(&base.join("index"), ext)))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    #[test]
    fn test_resolve_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "").unwrap();
        fs::write(dir.path().join("a.js"), "").unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/index.js"), "").unwrap();
        let exts = vec![".ts".to_string(), ".js".to_string()];

        assert_eq!(
            resolve("./a", dir.path(), &exts),
            Some(dir.path().join("a.ts"))
        );
        assert_eq!(
            resolve("./a.js", dir.path(), &exts),
            Some(dir.path().join("a.js"))
        );
        assert_eq!(
            resolve("./lib", dir.path(), &exts),
            Some(dir.path().join("lib/index.js"))
        );
        assert_eq!(resolve("jquery", dir.path(), &exts), None);
        assert_eq!(resolve("./missing", dir.path(), &exts), None);
    }
}
