//! Text-domain verification for translation calls.

use tracing::debug;

use themekit_core::adapter::{Outcome, TaskContext, ToolAdapter};
use themekit_core::error::Result;
use themekit_core::fileset::ResolvedSet;
use themekit_core::task::AdapterConfig;

use crate::keywords::{extract_calls, Arg, Call, KeywordSpec};
use crate::pot::keyword_table;
use crate::support::{config_mismatch, display_path, read_to_string};

/// Problem with the domain argument of one call, if any.
pub(crate) fn check_call(
    call: &Call,
    spec: &KeywordSpec,
    text_domain: &str,
    report_missing: bool,
) -> Option<String> {
    let position = spec.domain?;
    match call.arg(position) {
        None if report_missing => Some("Missing text domain".to_string()),
        None => None,
        Some(Arg::Expr(expr)) => Some(format!("Variable {} used for text domain", expr)),
        Some(Arg::Literal(found)) if found != text_domain => {
            Some(format!("Incorrect text domain used (\"{}\")", found))
        }
        Some(Arg::Literal(_)) => None,
    }
}

pub struct TextDomainAdapter;

impl ToolAdapter for TextDomainAdapter {
    fn tool(&self) -> &'static str {
        "checktextdomain"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        let AdapterConfig::TextDomain(options) = config else {
            return Err(config_mismatch(self.tool(), config));
        };
        let keywords = keyword_table(&options.keywords)?;
        let root = ctx.root();

        let mut diagnostics = Vec::new();
        let mut checked = 0usize;
        for file in sets.iter().flat_map(|s| s.files.iter()) {
            let source = read_to_string(&file.source)?;
            for call in extract_calls(&source, &keywords) {
                let Some(spec) = keywords.get(&call.keyword) else {
                    continue;
                };
                checked += 1;
                if let Some(problem) =
                    check_call(&call, spec, &options.text_domain, options.report_missing)
                {
                    diagnostics.push(format!(
                        "{}:{}  {}  ({})",
                        display_path(&file.source, root),
                        call.line,
                        problem,
                        call.keyword
                    ));
                }
            }
        }

        debug!("Checked {} translation call(s)", checked);
        if diagnostics.is_empty() {
            ctx.run.reporter().ok("All text domains are correct.");
        }
        Ok(Outcome::from_diagnostics(diagnostics))
    }
}
