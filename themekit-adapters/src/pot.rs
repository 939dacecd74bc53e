//! Translation template (`.pot`) extraction.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use themekit_core::adapter::{Outcome, TaskContext, ToolAdapter};
use themekit_core::error::Result;
use themekit_core::fileset::ResolvedSet;
use themekit_core::options::PotOptions;
use themekit_core::task::AdapterConfig;

use crate::keywords::{extract_calls, Arg, Call, KeywordSpec, DEFAULT_KEYWORDS};
use crate::support::{config_mismatch, display_path, read_to_string, write_file};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PotEntry {
    pub context: Option<String>,
    pub msgid: String,
    pub plural: Option<String>,
    pub references: Vec<String>,
}

/// Messages keyed by `(context, msgid)` in first-seen order.
#[derive(Debug, Default)]
pub(crate) struct Catalog {
    entries: IndexMap<(Option<String>, String), PotEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Adds the message of `call`, unless it belongs to another domain or
    /// its message is not a literal.
    pub fn add_call(&mut self, call: &Call, spec: &KeywordSpec, domain: &str, reference: String) {
        if let Some(position) = spec.domain {
            if let Some(Arg::Literal(found)) = call.arg(position) {
                if found != domain {
                    return;
                }
            }
        }
        let Some(msgid) = call.arg(spec.singular).and_then(Arg::literal) else {
            return;
        };
        if msgid.is_empty() {
            return;
        }
        let context = spec
            .context
            .and_then(|p| call.arg(p))
            .and_then(Arg::literal)
            .map(str::to_string);
        let plural = spec
            .plural
            .and_then(|p| call.arg(p))
            .and_then(Arg::literal)
            .map(str::to_string);

        let entry = self
            .entries
            .entry((context.clone(), msgid.to_string()))
            .or_insert_with(|| PotEntry {
                context,
                msgid: msgid.to_string(),
                plural: None,
                references: Vec::new(),
            });
        if entry.plural.is_none() {
            entry.plural = plural;
        }
        if !entry.references.contains(&reference) {
            entry.references.push(reference);
        }
    }

    /// Renders the template. The header carries no creation date so
    /// unchanged sources give an identical file.
    pub fn render(&self, options: &PotOptions) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "# Copyright (C) {name}\n# This file is distributed under the same license as the {name} package.\n",
            name = options.package_name
        ));
        out.push_str("msgid \"\"\nmsgstr \"\"\n");
        let headers = [
            format!(
                "Project-Id-Version: {} {}",
                options.package_name, options.package_version
            ),
            "MIME-Version: 1.0".to_string(),
            "Content-Type: text/plain; charset=UTF-8".to_string(),
            "Content-Transfer-Encoding: 8bit".to_string(),
            "PO-Revision-Date: YEAR-MO-DA HO:MI+ZONE".to_string(),
            "Last-Translator: FULL NAME <EMAIL@ADDRESS>".to_string(),
            "Language-Team: LANGUAGE <LL@li.org>".to_string(),
            "Plural-Forms: nplurals=INTEGER; plural=EXPRESSION;".to_string(),
            format!("X-Domain: {}", options.text_domain),
            "X-Generator: themekit".to_string(),
        ];
        for header in headers {
            out.push_str(&format!("\"{}\\n\"\n", escape(&header)));
        }

        for entry in self.entries.values() {
            out.push('\n');
            out.push_str(&format!("#: {}\n", entry.references.join(" ")));
            if let Some(context) = &entry.context {
                out.push_str(&format!("msgctxt \"{}\"\n", escape(context)));
            }
            out.push_str(&format!("msgid \"{}\"\n", escape(&entry.msgid)));
            match &entry.plural {
                Some(plural) => {
                    out.push_str(&format!("msgid_plural \"{}\"\n", escape(plural)));
                    out.push_str("msgstr[0] \"\"\nmsgstr[1] \"\"\n");
                }
                None => out.push_str("msgstr \"\"\n"),
            }
        }
        out
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Keyword specs from the options, or the WordPress defaults.
pub(crate) fn keyword_table(keywords: &[String]) -> Result<HashMap<String, KeywordSpec>> {
    if keywords.is_empty() {
        KeywordSpec::parse_all(DEFAULT_KEYWORDS)
    } else {
        KeywordSpec::parse_all(keywords)
    }
}

pub struct MakePotAdapter;

impl ToolAdapter for MakePotAdapter {
    fn tool(&self) -> &'static str {
        "makepot"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        let AdapterConfig::Pot(options) = config else {
            return Err(config_mismatch(self.tool(), config));
        };
        let keywords = keyword_table(&options.keywords)?;
        let src_root = ctx.src_root();

        let mut catalog = Catalog::new();
        for set in sets {
            for file in &set.files {
                let source = read_to_string(&file.source)?;
                let shown = display_path(&file.source, &src_root);
                for call in extract_calls(&source, &keywords) {
                    if let Some(spec) = keywords.get(&call.keyword) {
                        let reference = format!("{}:{}", shown, call.line);
                        catalog.add_call(&call, spec, &options.text_domain, reference);
                    }
                }
            }
        }

        let path = src_root
            .join(&options.domain_path)
            .join(format!("{}.pot", options.text_domain));
        write_file(&path, catalog.render(options))?;
        debug!("Extracted {} message(s)", catalog.len());
        ctx.run.reporter().ok(&format!(
            "POT file saved to {}",
            display_path(&path, ctx.root())
        ));
        Ok(Outcome::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn options() -> PotOptions {
        PotOptions {
            text_domain: "bagan-html".to_string(),
            domain_path: PathBuf::from("languages"),
            package_name: "bagan-html".to_string(),
            package_version: "1.0.0".to_string(),
            keywords: Vec::new(),
        }
    }

    fn catalog_of(source: &str) -> Catalog {
        let keywords = keyword_table(&[]).unwrap();
        let mut catalog = Catalog::new();
        for call in extract_calls(source, &keywords) {
            let spec = &keywords[&call.keyword];
            catalog.add_call(&call, spec, "bagan-html", format!("index.php:{}", call.line));
        }
        catalog
    }

    #[test]
    fn test_entries_merge_references() {
        let catalog = catalog_of(
            "<?php\n__( 'Read more', 'bagan-html' );\n_e( 'Read more', 'bagan-html' );\n__( 'Other', 'other-domain' );\n",
        );
        assert_eq!(catalog.len(), 1);
        let rendered = catalog.render(&options());
        assert!(rendered.contains("#: index.php:2 index.php:3\nmsgid \"Read more\"\nmsgstr \"\"\n"));
        assert!(!rendered.contains("Other"));
    }

    #[test]
    fn test_context_and_plural() {
        let catalog = catalog_of(
            "<?php _x( 'Post', 'noun', 'bagan-html' ); _n( '%s comment', '%s comments', $n, 'bagan-html' );",
        );
        let rendered = catalog.render(&options());
        assert!(rendered.contains("msgctxt \"noun\"\nmsgid \"Post\"\nmsgstr \"\"\n"));
        assert!(rendered.contains(
            "msgid \"%s comment\"\nmsgid_plural \"%s comments\"\nmsgstr[0] \"\"\nmsgstr[1] \"\"\n"
        ));
    }

    #[test]
    fn test_header() {
        let rendered = Catalog::new().render(&options());
        assert!(rendered.contains("\"Project-Id-Version: bagan-html 1.0.0\\n\"\n"));
        assert!(rendered.contains("\"X-Domain: bagan-html\\n\"\n"));
        assert!(!rendered.contains("POT-Creation-Date"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("say \"hi\"\n"), "say \\\"hi\\\"\\n");
    }
}
