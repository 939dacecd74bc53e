//! In-place minification of scripts and stylesheets.

use rayon::prelude::*;
use tracing::debug;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

use themekit_core::adapter::{Outcome, TaskContext, ToolAdapter};
use themekit_core::error::Result;
use themekit_core::fileset::{ResolvedFile, ResolvedSet};
use themekit_core::task::AdapterConfig;

use crate::support::{config_mismatch, display_path, read_to_string, write_file};

/// Strips comments and redundant whitespace from a script.
///
/// Strings, template literals and regex literals are copied untouched.
/// Line breaks between statements are kept, so automatic semicolon
/// insertion sees the same program; blank lines disappear. A space
/// survives only where dropping it would join two tokens.
pub(crate) fn minify_js(code: &str, keep_license_comments: bool) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut pending_space = false;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '/' if next == Some('/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if next == Some('*') => {
                let end = find_comment_end(&chars, i + 2);
                let comment: String = chars[i..end].iter().collect();
                if keep_license_comments && comment.starts_with("/*!") {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push(' ');
                    }
                    out.push_str(&comment);
                    pending_space = false;
                } else if comment.contains('\n') {
                    push_newline(&mut out);
                    pending_space = false;
                } else {
                    pending_space = true;
                }
                i = end;
                continue;
            }
            '\n' => {
                push_newline(&mut out);
                pending_space = false;
                i += 1;
                continue;
            }
            c if c.is_whitespace() => {
                pending_space = true;
                i += 1;
                continue;
            }
            _ => {}
        }

        if std::mem::take(&mut pending_space) && needs_space(out.chars().last(), c) {
            out.push(' ');
        }
        match c {
            '"' | '\'' | '`' => i = copy_literal(&chars, i, c, &mut out),
            '/' if regex_allowed(&out) => i = copy_regex(&chars, i, &mut out),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Whether `before` and `after` would fuse into another token without a
/// space between them.
fn needs_space(before: Option<char>, after: char) -> bool {
    let Some(before) = before else {
        return false;
    };
    if is_word_char(before) && is_word_char(after) {
        return true;
    }
    matches!(
        (before, after),
        ('+', '+') | ('-', '-') | ('/', '/') | ('/', '*')
    ) || (before.is_ascii_digit() && after == '.')
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '\\'
}

fn push_newline(out: &mut String) {
    let trimmed = out.trim_end_matches(' ').len();
    out.truncate(trimmed);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Index just past the closing `*/`, or the end of input.
fn find_comment_end(chars: &[char], from: usize) -> usize {
    let mut j = from;
    while j + 1 < chars.len() {
        if chars[j] == '*' && chars[j + 1] == '/' {
            return j + 2;
        }
        j += 1;
    }
    chars.len()
}

/// Copies a string or template literal starting at `start`.
fn copy_literal(chars: &[char], start: usize, quote: char, out: &mut String) -> usize {
    out.push(quote);
    let mut j = start + 1;
    while j < chars.len() {
        let c = chars[j];
        out.push(c);
        j += 1;
        if c == '\\' {
            if let Some(&escaped) = chars.get(j) {
                out.push(escaped);
                j += 1;
            }
        } else if c == quote {
            break;
        }
    }
    j
}

fn copy_regex(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('/');
    let mut j = start + 1;
    let mut in_class = false;
    while j < chars.len() && chars[j] != '\n' {
        let c = chars[j];
        out.push(c);
        j += 1;
        match c {
            '\\' => {
                if let Some(&escaped) = chars.get(j) {
                    out.push(escaped);
                    j += 1;
                }
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => break,
            _ => {}
        }
    }
    while j < chars.len() && chars[j].is_ascii_alphabetic() {
        out.push(chars[j]);
        j += 1;
    }
    j
}

/// A `/` starts a regex literal where an expression may begin.
fn regex_allowed(out: &str) -> bool {
    let before = out.trim_end();
    let Some(last) = before.chars().last() else {
        return true;
    };
    if "(,=:[!&|?{};+-*%<>~^".contains(last) {
        return true;
    }
    let word: String = before
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    matches!(
        word.as_str(),
        "return" | "typeof" | "case" | "do" | "else" | "in" | "of" | "new" | "delete" | "void"
            | "throw" | "yield" | "await"
    )
}

/// Re-prints a stylesheet through lightningcss.
pub(crate) fn minify_css(
    name: &str,
    source: &str,
    compress: bool,
) -> std::result::Result<String, String> {
    let mut sheet = StyleSheet::parse(
        source,
        ParserOptions {
            filename: name.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| e.to_string())?;

    if compress {
        sheet
            .minify(MinifyOptions::default())
            .map_err(|e| e.to_string())?;
    }

    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;
    Ok(printed.code)
}

fn all_files(sets: &[ResolvedSet]) -> Vec<&ResolvedFile> {
    sets.iter().flat_map(|s| s.files.iter()).collect()
}

pub struct JsMinifyAdapter;

impl ToolAdapter for JsMinifyAdapter {
    fn tool(&self) -> &'static str {
        "jsmin"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        let AdapterConfig::MinifyJs(options) = config else {
            return Err(config_mismatch(self.tool(), config));
        };
        let files = all_files(sets);

        let minified: Vec<Result<String>> = files
            .par_iter()
            .map(|file| {
                read_to_string(&file.source)
                    .map(|code| minify_js(&code, options.keep_license_comments))
            })
            .collect();

        for (file, result) in files.iter().zip(minified) {
            write_file(&file.destination, result?)?;
            debug!("Minified {}", display_path(&file.destination, ctx.root()));
        }

        ctx.run
            .reporter()
            .ok(&format!("{} file(s) minified.", files.len()));
        Ok(Outcome::Ok)
    }
}

pub struct CssMinifyAdapter;

impl ToolAdapter for CssMinifyAdapter {
    fn tool(&self) -> &'static str {
        "cssmin"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        let AdapterConfig::MinifyCss(options) = config else {
            return Err(config_mismatch(self.tool(), config));
        };
        let root = ctx.root();
        let reporter = ctx.run.reporter();
        let files = all_files(sets);

        let minified: Vec<Result<std::result::Result<String, String>>> = files
            .par_iter()
            .map(|file| {
                let name = display_path(&file.source, root);
                read_to_string(&file.source).map(|css| minify_css(&name, &css, options.compress))
            })
            .collect();

        let mut written = 0usize;
        let mut diagnostics = Vec::new();
        for (file, result) in files.iter().zip(minified) {
            match result? {
                Ok(css) => {
                    write_file(&file.destination, css)?;
                    written += 1;
                }
                Err(message) => {
                    let diagnostic =
                        format!("{}: {}", display_path(&file.source, root), message);
                    if options.force {
                        reporter.warn(&diagnostic);
                    } else {
                        diagnostics.push(diagnostic);
                    }
                }
            }
        }

        if diagnostics.is_empty() {
            reporter.ok(&format!("{} file(s) minified.", written));
        }
        Ok(Outcome::from_diagnostics(diagnostics))
    }
}
