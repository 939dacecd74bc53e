//! Stylesheet linting with an in-crate rule engine.
//!
//! Rules:
//!
//! | rule | fixable |
//! |---|---|
//! | `no-trailing-whitespace` | yes |
//! | `final-newline` | yes |
//! | `no-multiple-empty-lines` | yes |
//! | `indentation` (tabs, one per block level) | yes |
//! | `no-empty-block` | no |
//!
//! A JSON configuration file (`{"rules": {"indentation": false}}`) toggles
//! rules; rules it does not mention stay enabled.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use themekit_core::adapter::{Outcome, TaskContext, ToolAdapter};
use themekit_core::error::{Error, Result};
use themekit_core::fileset::ResolvedSet;
use themekit_core::task::AdapterConfig;

use crate::support::{config_mismatch, display_path, read_to_string, write_file};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rule {
    NoTrailingWhitespace,
    FinalNewline,
    NoMultipleEmptyLines,
    Indentation,
    NoEmptyBlock,
}

impl Rule {
    const ALL: [Rule; 5] = [
        Rule::NoTrailingWhitespace,
        Rule::FinalNewline,
        Rule::NoMultipleEmptyLines,
        Rule::Indentation,
        Rule::NoEmptyBlock,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Rule::NoTrailingWhitespace => "no-trailing-whitespace",
            Rule::FinalNewline => "final-newline",
            Rule::NoMultipleEmptyLines => "no-multiple-empty-lines",
            Rule::Indentation => "indentation",
            Rule::NoEmptyBlock => "no-empty-block",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Rule::ALL.into_iter().find(|r| r.name() == name)
    }
}

/// Enabled rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RuleSet {
    enabled: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            enabled: Rule::ALL.to_vec(),
        }
    }
}

#[derive(Deserialize)]
struct LintConfigFile {
    #[serde(default)]
    rules: serde_json::Map<String, serde_json::Value>,
}

impl RuleSet {
    /// Parses a JSON rule configuration. `false` and `null` disable a rule.
    pub fn from_json(text: &str) -> std::result::Result<Self, String> {
        let file: LintConfigFile = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let mut set = RuleSet::default();
        for (name, value) in &file.rules {
            let rule = Rule::from_name(name).ok_or_else(|| format!("unknown rule '{}'", name))?;
            if matches!(value, serde_json::Value::Bool(false) | serde_json::Value::Null) {
                set.enabled.retain(|r| *r != rule);
            }
        }
        Ok(set)
    }

    /// Reads the configuration at `path`, or the defaults when it is absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.filter(|p| p.is_file()) else {
            return Ok(RuleSet::default());
        };
        let text = read_to_string(path)?;
        RuleSet::from_json(&text)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    pub fn is_enabled(&self, rule: Rule) -> bool {
        self.enabled.contains(&rule)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Warning {
    pub line: usize,
    pub column: usize,
    pub rule: Rule,
    pub message: String,
}

/// Block depth and comment state at the start of one line.
#[derive(Debug, Clone, Copy, Default)]
struct LineState {
    depth: usize,
    in_comment: bool,
    /// The previous statement has not ended, so indentation is free.
    continuation: bool,
}

struct Scan {
    lines: Vec<LineState>,
    empty_blocks: Vec<(usize, usize)>,
}

/// Walks the stylesheet once, skipping strings and comments.
fn scan(source: &str) -> Scan {
    let chars: Vec<char> = source.chars().collect();
    let mut lines = Vec::new();
    let mut empty_blocks = Vec::new();

    let mut depth = 0usize;
    let mut in_comment = false;
    let mut quote: Option<char> = None;
    let mut last_significant: Option<char> = None;
    let mut open_block: Option<(usize, usize)> = None;
    let mut line = 1usize;
    let mut column = 1usize;
    let mut at_line_start = true;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if at_line_start {
            lines.push(LineState {
                depth,
                in_comment,
                continuation: !matches!(last_significant, None | Some('{' | '}' | ';')),
            });
            at_line_start = false;
        }

        if in_comment {
            if c == '*' && chars.get(i + 1) == Some(&'/') {
                in_comment = false;
                i += 1;
                column += 1;
            }
        } else if let Some(q) = quote {
            if c == '\\' {
                i += 1;
                column += 1;
            } else if c == q {
                quote = None;
            }
        } else {
            match c {
                '/' if chars.get(i + 1) == Some(&'*') => {
                    in_comment = true;
                    open_block = None;
                    i += 1;
                    column += 1;
                }
                '/' if chars.get(i + 1) == Some(&'/')
                    && (i == 0 || chars[i - 1].is_whitespace()) =>
                {
                    open_block = None;
                    while i + 1 < chars.len() && chars[i + 1] != '\n' {
                        i += 1;
                    }
                }
                '"' | '\'' => {
                    quote = Some(c);
                    open_block = None;
                    last_significant = Some(c);
                }
                '{' => {
                    depth += 1;
                    open_block = Some((line, column));
                    last_significant = Some(c);
                }
                '}' => {
                    depth = depth.saturating_sub(1);
                    if let Some(at) = open_block.take() {
                        empty_blocks.push(at);
                    }
                    last_significant = Some(c);
                }
                c if c.is_whitespace() => {}
                c => {
                    open_block = None;
                    last_significant = Some(c);
                }
            }
        }

        if chars.get(i) == Some(&'\n') {
            line += 1;
            column = 1;
            at_line_start = true;
        } else {
            column += 1;
        }
        i += 1;
    }

    Scan {
        lines,
        empty_blocks,
    }
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start_matches([' ', '\t']).len()]
}

/// Expected tab count for `line`, or `None` when indentation is not checked.
fn expected_indent(line: &str, state: &LineState) -> Option<usize> {
    let trimmed = line.trim_start_matches([' ', '\t']);
    if trimmed.is_empty() || state.in_comment {
        return None;
    }
    if trimmed.starts_with('}') {
        return Some(state.depth.saturating_sub(1));
    }
    if state.continuation {
        return None;
    }
    Some(state.depth)
}

pub(crate) fn lint(source: &str, rules: &RuleSet) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let scanned = scan(source);
    let mut blank_run = 0usize;

    for (index, line) in source.lines().enumerate() {
        let number = index + 1;
        let state = scanned.lines.get(index).copied().unwrap_or_default();

        if rules.is_enabled(Rule::NoTrailingWhitespace) {
            let trimmed = line.trim_end_matches([' ', '\t', '\r']);
            if trimmed.len() != line.len() && !line.trim().is_empty() {
                warnings.push(Warning {
                    line: number,
                    column: trimmed.chars().count() + 1,
                    rule: Rule::NoTrailingWhitespace,
                    message: "Unexpected whitespace at end of line".to_string(),
                });
            }
        }

        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run == 2 && rules.is_enabled(Rule::NoMultipleEmptyLines) {
                warnings.push(Warning {
                    line: number,
                    column: 1,
                    rule: Rule::NoMultipleEmptyLines,
                    message: "Expected no more than 1 empty line".to_string(),
                });
            }
            continue;
        }
        blank_run = 0;

        if rules.is_enabled(Rule::Indentation) {
            if let Some(expected) = expected_indent(line, &state) {
                let actual = leading_whitespace(line);
                if actual.len() != expected || actual.contains(' ') {
                    warnings.push(Warning {
                        line: number,
                        column: actual.chars().count() + 1,
                        rule: Rule::Indentation,
                        message: format!("Expected indentation of {} tab(s)", expected),
                    });
                }
            }
        }
    }

    if rules.is_enabled(Rule::NoEmptyBlock) {
        for (line, column) in scanned.empty_blocks {
            warnings.push(Warning {
                line,
                column,
                rule: Rule::NoEmptyBlock,
                message: "Unexpected empty block".to_string(),
            });
        }
    }

    if rules.is_enabled(Rule::FinalNewline) && !source.is_empty() && !source.ends_with('\n') {
        warnings.push(Warning {
            line: source.lines().count().max(1),
            column: source.lines().last().map(|l| l.chars().count() + 1).unwrap_or(1),
            rule: Rule::FinalNewline,
            message: "Expected a newline at the end of file".to_string(),
        });
    }

    warnings.sort_by_key(|w| (w.line, w.column));
    warnings
}

/// Rewrites every fixable problem. Empty blocks are left alone.
pub(crate) fn fix(source: &str, rules: &RuleSet) -> String {
    let scanned = scan(source);
    let mut out = String::with_capacity(source.len());
    let mut blank_run = 0usize;

    for (index, line) in source.lines().enumerate() {
        let state = scanned.lines.get(index).copied().unwrap_or_default();
        let mut line = line.to_string();

        if rules.is_enabled(Rule::NoTrailingWhitespace) || line.trim().is_empty() {
            line.truncate(line.trim_end_matches([' ', '\t', '\r']).len());
        }

        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 && rules.is_enabled(Rule::NoMultipleEmptyLines) {
                continue;
            }
            out.push('\n');
            continue;
        }
        blank_run = 0;

        if rules.is_enabled(Rule::Indentation) {
            if let Some(expected) = expected_indent(&line, &state) {
                let body = line.trim_start_matches([' ', '\t']).to_string();
                line = "\t".repeat(expected) + &body;
            }
        }

        out.push_str(&line);
        out.push('\n');
    }

    if !rules.is_enabled(Rule::FinalNewline) && !source.ends_with('\n') && out.ends_with('\n') {
        out.pop();
    }
    out
}

pub struct StyleLintAdapter;

impl ToolAdapter for StyleLintAdapter {
    fn tool(&self) -> &'static str {
        "stylelint"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        let AdapterConfig::StyleLint(options) = config else {
            return Err(config_mismatch(self.tool(), config));
        };
        let root = ctx.root();
        let config_path = options.config_file.as_ref().map(|p| ctx.src_root().join(p));
        let rules = RuleSet::load(config_path.as_deref())?;

        let mut diagnostics = Vec::new();
        let mut checked = 0usize;
        let mut fixed = 0usize;

        for file in sets.iter().flat_map(|s| s.files.iter()) {
            let mut source = read_to_string(&file.source)?;
            if options.fix {
                let repaired = fix(&source, &rules);
                if repaired != source {
                    write_file(&file.source, &repaired)?;
                    fixed += 1;
                    source = repaired;
                }
            }
            checked += 1;

            let shown = display_path(&file.source, root);
            for warning in lint(&source, &rules) {
                diagnostics.push(format!(
                    "{}:{}:{}  {}  ({})",
                    shown,
                    warning.line,
                    warning.column,
                    warning.message,
                    warning.rule.name()
                ));
            }
        }

        debug!("Linted {} stylesheet(s), fixed {}", checked, fixed);
        if diagnostics.is_empty() {
            ctx.run
                .reporter()
                .ok(&format!("Linted {} file(s) without problems.", checked));
        }
        Ok(Outcome::from_diagnostics(diagnostics))
    }
}
