//! Gettext keyword specs and extraction of keyword calls from PHP sources.

use std::collections::HashMap;

use themekit_core::error::{Error, Result};

/// WordPress translation functions with their argument positions.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "__:1,2d",
    "_e:1,2d",
    "_x:1,2c,3d",
    "esc_html__:1,2d",
    "esc_html_e:1,2d",
    "esc_html_x:1,2c,3d",
    "esc_attr__:1,2d",
    "esc_attr_e:1,2d",
    "esc_attr_x:1,2c,3d",
    "_ex:1,2c,3d",
    "_n:1,2,4d",
    "_nx:1,2,4c,5d",
    "_n_noop:1,2,3d",
    "_nx_noop:1,2,3c,4d",
];

/// Parsed `name:positions` spec. Positions are 1-based argument indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeywordSpec {
    pub name: String,
    pub singular: usize,
    pub plural: Option<usize>,
    pub context: Option<usize>,
    pub domain: Option<usize>,
}

impl KeywordSpec {
    /// Parses specs such as `_nx:1,2,4c,5d`. A bare name takes its
    /// message from the first argument.
    ///
    /// # Errors
    ///
    /// Returns `config-invalid` for malformed positions.
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || Error::config(format!("invalid keyword spec '{}'", spec));
        let (name, positions) = match spec.split_once(':') {
            Some((name, positions)) => (name.trim(), positions.trim()),
            None => (spec.trim(), ""),
        };
        if name.is_empty() {
            return Err(invalid());
        }

        let mut messages = Vec::new();
        let mut context = None;
        let mut domain = None;
        for part in positions.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (digits, kind) = match part.chars().last() {
                Some(c @ ('c' | 'd')) => (&part[..part.len() - 1], Some(c)),
                _ => (part, None),
            };
            let position: usize = digits.parse().map_err(|_| invalid())?;
            if position == 0 {
                return Err(invalid());
            }
            match kind {
                Some('c') => context = Some(position),
                Some('d') => domain = Some(position),
                _ => messages.push(position),
            }
        }
        if messages.len() > 2 {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_string(),
            singular: messages.first().copied().unwrap_or(1),
            plural: messages.get(1).copied(),
            context,
            domain,
        })
    }

    /// Parses every spec into a lookup by function name.
    pub fn parse_all<S: AsRef<str>>(specs: &[S]) -> Result<HashMap<String, KeywordSpec>> {
        specs
            .iter()
            .map(|s| KeywordSpec::parse(s.as_ref()).map(|k| (k.name.clone(), k)))
            .collect()
    }
}

/// One argument of a keyword call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Arg {
    /// A single quoted string, unescaped.
    Literal(String),
    /// Anything else: variables, concatenations, calls.
    Expr(String),
}

impl Arg {
    pub fn literal(&self) -> Option<&str> {
        match self {
            Arg::Literal(text) => Some(text),
            Arg::Expr(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub keyword: String,
    pub args: Vec<Arg>,
    /// 1-based line of the function name.
    pub line: usize,
}

impl Call {
    /// Argument at a 1-based position.
    pub fn arg(&self, position: usize) -> Option<&Arg> {
        position.checked_sub(1).and_then(|i| self.args.get(i))
    }
}

/// Finds calls to the given functions inside the PHP blocks of `source`.
pub(crate) fn extract_calls(source: &str, keywords: &HashMap<String, KeywordSpec>) -> Vec<Call> {
    let chars: Vec<char> = source.chars().collect();
    let mut calls = Vec::new();
    let mut line = 1usize;
    let mut in_php = false;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if !in_php {
            if starts_with(&chars, i, "<?") {
                in_php = true;
                i += 2;
                continue;
            }
            if c == '\n' {
                line += 1;
            }
            i += 1;
            continue;
        }

        if starts_with(&chars, i, "?>") {
            in_php = false;
            i += 2;
            continue;
        }

        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            '\'' | '"' => {
                let end = skip_string(&chars, i);
                line += count_newlines(&chars[i..end]);
                i = end;
            }
            '#' => i = skip_line_comment(&chars, i),
            '/' if chars.get(i + 1) == Some(&'/') => i = skip_line_comment(&chars, i),
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = skip_block_comment(&chars, i);
                line += count_newlines(&chars[i..end]);
                i = end;
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                if !keywords.contains_key(&name) || !is_call_site(&chars, start) {
                    continue;
                }
                let mut open = i;
                while open < chars.len() && chars[open].is_whitespace() {
                    open += 1;
                }
                if chars.get(open) != Some(&'(') {
                    continue;
                }
                let (args, end) = split_args(&chars, open);
                calls.push(Call {
                    keyword: name,
                    args,
                    line,
                });
                line += count_newlines(&chars[i..end]);
                i = end;
            }
            _ => i += 1,
        }
    }

    calls
}

fn starts_with(chars: &[char], at: usize, needle: &str) -> bool {
    needle
        .chars()
        .enumerate()
        .all(|(k, n)| chars.get(at + k) == Some(&n))
}

fn count_newlines(chars: &[char]) -> usize {
    chars.iter().filter(|c| **c == '\n').count()
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Rejects methods, variables and function definitions with a keyword name.
fn is_call_site(chars: &[char], start: usize) -> bool {
    let before: String = chars[start.saturating_sub(16)..start].iter().collect();
    let before = before.trim_end();
    !(before.ends_with("->")
        || before.ends_with("::")
        || before.ends_with('$')
        || before.ends_with("function"))
}

/// Index just past the closing quote.
fn skip_string(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    chars.len()
}

/// Stops at the newline or at a closing `?>`.
fn skip_line_comment(chars: &[char], start: usize) -> usize {
    let mut j = start;
    while j < chars.len() && chars[j] != '\n' && !starts_with(chars, j, "?>") {
        j += 1;
    }
    j
}

fn skip_block_comment(chars: &[char], start: usize) -> usize {
    let mut j = start + 2;
    while j < chars.len() {
        if starts_with(chars, j, "*/") {
            return j + 2;
        }
        j += 1;
    }
    chars.len()
}

/// Splits the argument list opening at `open`. Returns the arguments and
/// the index just past the closing parenthesis.
fn split_args(chars: &[char], open: usize) -> (Vec<Arg>, usize) {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut j = open + 1;

    while j < chars.len() {
        let c = chars[j];
        match c {
            '\'' | '"' => {
                let end = skip_string(chars, j).min(chars.len());
                current.extend(&chars[j..end]);
                j = end;
                continue;
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' if depth > 0 => depth -= 1,
            ')' => {
                if !current.trim().is_empty() || !args.is_empty() {
                    args.push(classify(&current));
                }
                return (args, j + 1);
            }
            ',' if depth == 0 => {
                args.push(classify(&current));
                current.clear();
                j += 1;
                continue;
            }
            _ => {}
        }
        current.push(c);
        j += 1;
    }

    args.push(classify(&current));
    (args, chars.len())
}

fn classify(raw: &str) -> Arg {
    let text = raw.trim();
    let mut chars = text.chars();
    let quote = match chars.next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return Arg::Expr(text.to_string()),
    };
    let inner: Vec<char> = text.chars().collect();
    if inner.len() < 2 || skip_string(&inner, 0) != inner.len() {
        return Arg::Expr(text.to_string());
    }
    let body = &inner[1..inner.len() - 1];
    if quote == '"' && body.contains(&'$') {
        return Arg::Expr(text.to_string());
    }
    Arg::Literal(unescape(body, quote))
}

fn unescape(body: &[char], quote: char) -> String {
    let mut out = String::with_capacity(body.len());
    let mut k = 0usize;
    while k < body.len() {
        let c = body[k];
        if c == '\\' && k + 1 < body.len() {
            let next = body[k + 1];
            let replacement = match (quote, next) {
                (_, '\\') => Some('\\'),
                ('\'', '\'') => Some('\''),
                ('"', '"') => Some('"'),
                ('"', 'n') => Some('\n'),
                ('"', 't') => Some('\t'),
                ('"', 'r') => Some('\r'),
                ('"', '$') => Some('$'),
                _ => None,
            };
            if let Some(r) = replacement {
                out.push(r);
                k += 2;
                continue;
            }
        }
        out.push(c);
        k += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> HashMap<String, KeywordSpec> {
        KeywordSpec::parse_all(DEFAULT_KEYWORDS).unwrap()
    }

    #[test]
    fn test_parse_spec() {
        let spec = KeywordSpec::parse("_nx:1,2,4c,5d").unwrap();
        assert_eq!(spec.name, "_nx");
        assert_eq!(spec.singular, 1);
        assert_eq!(spec.plural, Some(2));
        assert_eq!(spec.context, Some(4));
        assert_eq!(spec.domain, Some(5));

        let bare = KeywordSpec::parse("gettext").unwrap();
        assert_eq!(bare.singular, 1);
        assert_eq!(bare.domain, None);

        assert!(KeywordSpec::parse("_x:one").is_err());
        assert!(KeywordSpec::parse(":1").is_err());
    }

    #[test]
    fn test_extracts_calls_in_php_blocks() {
        let source = "<h1>Don't _e('skip')</h1>\n<?php\n// __('comment')\necho __( 'Hello', 'bagan-html' );\n_x(\"Post\", 'noun',\n   $domain);\n$obj->__('method');\n?>\n<p><?php esc_html_e( 'It\\'s', 'bagan-html' ); ?></p>\n";
        let calls = extract_calls(source, &defaults());

        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].keyword, "__");
        assert_eq!(calls[0].line, 4);
        assert_eq!(
            calls[0].args,
            vec![
                Arg::Literal("Hello".to_string()),
                Arg::Literal("bagan-html".to_string())
            ]
        );
        assert_eq!(calls[1].keyword, "_x");
        assert_eq!(calls[1].line, 5);
        assert_eq!(calls[1].arg(3), Some(&Arg::Expr("$domain".to_string())));
        assert_eq!(calls[2].keyword, "esc_html_e");
        assert_eq!(calls[2].line, 9);
        assert_eq!(calls[2].arg(1), Some(&Arg::Literal("It's".to_string())));
    }

    #[test]
    fn test_nested_arguments() {
        let source = "<?php printf( _n( '%s item', '%s items', count( $a ), 'bagan-html' ), 3 );";
        let calls = extract_calls(source, &defaults());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args.len(), 4);
        assert_eq!(calls[0].arg(3), Some(&Arg::Expr("count( $a )".to_string())));
    }

    #[test]
    fn test_interpolated_string_is_expression() {
        let source = "<?php __( \"Hi $name\", 'd' );";
        let calls = extract_calls(source, &defaults());
        assert!(matches!(calls[0].arg(1), Some(Arg::Expr(_))));
    }
}
