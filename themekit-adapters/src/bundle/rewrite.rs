//! Dependency extraction and ES module to CommonJS rewriting.

use std::collections::HashMap;

use regex::{Captures, Regex};

use themekit_core::error::{Error, Result};

/// Module wrapped by the bundle runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RewrittenModule {
    pub code: String,
    /// The source used `import`/`export` syntax.
    pub esm: bool,
    /// `(exported name, local binding)` pairs exposed as getters.
    pub exports: Vec<(String, String)>,
}

/// Compiled patterns for the module syntax the bundler understands.
pub(crate) struct ModuleRewriter {
    import: Regex,
    export_from: Regex,
    export_decl: Regex,
    export_default: Regex,
    export_list: Regex,
    require: Regex,
    dynamic_import: Regex,
    node_env: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::config(format!("invalid module pattern: {}", e)))
}

impl ModuleRewriter {
    /// # Errors
    ///
    /// Only fails if a built-in pattern does not compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            import: compile(
                r#"(?m)^[ \t]*import\s+(?:(?P<default>[\w$]+)\s*,?\s*)?(?:\{(?P<named>[^}]*)\}\s*|\*\s*as\s+(?P<ns>[\w$]+)\s*)?(?:from\s*)?["'](?P<spec>[^"'\n]+)["'][ \t]*;?"#,
            )?,
            export_from: compile(
                r#"(?m)^[ \t]*export\s*(?:\*\s*(?:as\s+(?P<ns>[\w$]+)\s*)?|\{(?P<named>[^}]*)\}\s*)from\s*["'](?P<spec>[^"'\n]+)["'][ \t]*;?"#,
            )?,
            export_decl: compile(
                r"(?m)^(?P<indent>[ \t]*)export\s+(?P<default>default\s+)?(?P<kw>(?:async\s+)?function\s*\*?|class|const|let|var)\s+(?P<name>[\w$]+)",
            )?,
            export_default: compile(r"(?m)^(?P<indent>[ \t]*)export\s+default\s+")?,
            export_list: compile(r"(?m)^[ \t]*export\s*\{(?P<named>[^}]*)\}[ \t]*;?")?,
            require: compile(r#"\brequire\s*\(\s*["'](?P<spec>[^"'\n]+)["']\s*\)"#)?,
            dynamic_import: compile(r#"\bimport\s*\(\s*["'](?P<spec>[^"'\n]+)["']\s*\)"#)?,
            node_env: compile(r"\bprocess\.env\.NODE_ENV\b")?,
        })
    }

    /// Import specifiers in source order, without duplicates.
    pub fn dependencies(&self, source: &str) -> Vec<String> {
        let mut found: Vec<(usize, String)> = Vec::new();
        for re in [&self.import, &self.export_from, &self.require, &self.dynamic_import] {
            for caps in re.captures_iter(source) {
                if let (Some(whole), Some(spec)) = (caps.get(0), caps.name("spec")) {
                    found.push((whole.start(), spec.as_str().to_string()));
                }
            }
        }
        found.sort_by_key(|(offset, _)| *offset);

        let mut specs: Vec<String> = Vec::new();
        for (_, spec) in found {
            if !specs.contains(&spec) {
                specs.push(spec);
            }
        }
        specs
    }

    /// Rewrites module syntax into calls on the bundle runtime.
    ///
    /// `ids` maps each specifier to its module id. Line breaks inside
    /// rewritten statements are preserved so lines keep their positions.
    pub fn rewrite(&self, source: &str, ids: &HashMap<String, usize>, mode: &str) -> RewrittenModule {
        let mut esm = false;
        let mut exports: Vec<(String, String)> = Vec::new();
        let require_of = |spec: &str| match ids.get(spec) {
            Some(id) => format!("__themekit_require__({})", id),
            None => format!("require({:?})", spec),
        };

        let code = self.import.replace_all(source, |caps: &Captures| {
            esm = true;
            let spec = &caps["spec"];
            let module = require_of(spec);
            let default = caps.name("default").map(|m| m.as_str());
            let named = caps.name("named").map(|m| destructure(m.as_str()));
            let ns = caps.name("ns").map(|m| m.as_str());

            let statement = match (default, named, ns) {
                (None, None, None) => format!("{};", module),
                (None, Some(named), _) => format!("const {{ {} }} = {};", named, module),
                (None, None, Some(ns)) => format!("const {} = {};", ns, module),
                (Some(default), None, None) => {
                    format!("const {} = __themekit_default__({});", default, module)
                }
                (Some(default), named, ns) => {
                    let tmp = format!("__themekit_m{}", ids.get(spec).copied().unwrap_or(0));
                    let mut parts = vec![
                        format!("const {} = {};", tmp, module),
                        format!("const {} = __themekit_default__({});", default, tmp),
                    ];
                    if let Some(named) = named {
                        parts.push(format!("const {{ {} }} = {};", named, tmp));
                    }
                    if let Some(ns) = ns {
                        parts.push(format!("const {} = {};", ns, tmp));
                    }
                    parts.join(" ")
                }
            };
            keep_lines(&caps[0], statement)
        });

        let code = self.export_from.replace_all(&code, |caps: &Captures| {
            esm = true;
            let module = require_of(&caps["spec"]);
            let statement = match (caps.name("ns"), caps.name("named")) {
                (Some(ns), _) => format!(
                    "__themekit_export__(exports, {{ {}: () => {} }});",
                    ns.as_str(),
                    module
                ),
                (None, Some(named)) => {
                    let getters: Vec<String> = specifiers(named.as_str())
                        .into_iter()
                        .map(|(local, exported)| format!("{}: () => {}.{}", exported, module, local))
                        .collect();
                    format!("__themekit_export__(exports, {{ {} }});", getters.join(", "))
                }
                (None, None) => format!("__themekit_star__(exports, {});", module),
            };
            keep_lines(&caps[0], statement)
        });

        let code = self.export_decl.replace_all(&code, |caps: &Captures| {
            esm = true;
            let name = caps["name"].to_string();
            let exported = if caps.name("default").is_some() {
                "default".to_string()
            } else {
                name.clone()
            };
            exports.push((exported, name.clone()));
            format!("{}{} {}", &caps["indent"], &caps["kw"], name)
        });

        let code = self.export_default.replace_all(&code, |caps: &Captures| {
            esm = true;
            format!("{}exports.default = ", &caps["indent"])
        });

        let code = self.export_list.replace_all(&code, |caps: &Captures| {
            esm = true;
            for (local, exported) in specifiers(&caps["named"]) {
                exports.push((exported, local));
            }
            keep_lines(&caps[0], String::new())
        });

        let code = self.require.replace_all(&code, |caps: &Captures| require_of(&caps["spec"]));
        let code = self.dynamic_import.replace_all(&code, |caps: &Captures| {
            format!("Promise.resolve().then(() => {})", require_of(&caps["spec"]))
        });
        let code = self.node_env.replace_all(&code, format!("{:?}", mode).as_str());

        RewrittenModule {
            code: code.into_owned(),
            esm,
            exports,
        }
    }
}

/// `a, b as c` into `(local, exported)` pairs. Type-only specifiers are dropped.
fn specifiers(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with("type "))
        .map(|s| match s.split_once(" as ") {
            Some((local, exported)) => (local.trim().to_string(), exported.trim().to_string()),
            None => (s.to_string(), s.to_string()),
        })
        .collect()
}

/// Import specifier list as a destructuring pattern.
fn destructure(list: &str) -> String {
    specifiers(list)
        .into_iter()
        .map(|(imported, local)| {
            if imported == local {
                local
            } else {
                format!("{}: {}", imported, local)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn keep_lines(original: &str, mut replacement: String) -> String {
    for _ in 0..original.matches('\n').count() {
        replacement.push('\n');
    }
    replacement
}
