//! Loader pipelines: per-file transformations applied before bundling.

use std::path::Path;

use regex::Regex;

use themekit_core::error::{Error, Result};
use themekit_core::options::LoaderRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Loader {
    Ts,
    Sass,
    Css,
    Style,
}

impl Loader {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ts-loader" => Some(Loader::Ts),
            "sass-loader" => Some(Loader::Sass),
            "css-loader" => Some(Loader::Css),
            "style-loader" => Some(Loader::Style),
            _ => None,
        }
    }

    fn apply(&self, path: &Path, source: String) -> std::result::Result<String, String> {
        match self {
            Loader::Ts => Ok(strip_types(&source)),
            Loader::Sass => compile_sass(path, &source),
            Loader::Css => {
                let literal = serde_json::to_string(&source).map_err(|e| e.to_string())?;
                Ok(format!("module.exports = {};\n", literal))
            }
            Loader::Style => Ok(inject_style(&source)),
        }
    }
}

/// A rule with its regexes compiled.
#[derive(Debug)]
pub(crate) struct CompiledRule {
    test: Regex,
    exclude: Option<Regex>,
    loaders: Vec<String>,
}

impl CompiledRule {
    /// # Errors
    ///
    /// Returns `config-invalid` when `test` or `exclude` is not a valid regex.
    pub fn new(rule: &LoaderRule) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                Error::config(format!("invalid loader rule pattern '{}': {}", pattern, e))
            })
        };
        Ok(Self {
            test: compile(&rule.test)?,
            exclude: rule.exclude.as_deref().map(compile).transpose()?,
            loaders: rule.loaders.clone(),
        })
    }

    fn matches(&self, path: &str) -> bool {
        self.test.is_match(path) && !self.exclude.as_ref().is_some_and(|e| e.is_match(path))
    }
}

/// Runs the loaders of the first matching rule, right to left. Files no
/// rule claims pass through when they are scripts or JSON.
///
/// Returns a diagnostic message on failure.
pub(crate) fn load(
    rules: &[CompiledRule],
    path: &Path,
    source: String,
) -> std::result::Result<String, String> {
    let slash_path = path.to_string_lossy().replace('\\', "/");

    let Some(rule) = rules.iter().find(|r| r.matches(&slash_path)) else {
        return match path.extension().and_then(|e| e.to_str()) {
            Some("js" | "mjs" | "cjs") => Ok(source),
            Some("json") => {
                serde_json::from_str::<serde_json::Value>(&source)
                    .map_err(|e| format!("Invalid JSON in {}: {}", slash_path, e))?;
                Ok(format!("module.exports = {};", source.trim()))
            }
            _ => Err(format!(
                "Module parse failed: {}. You may need an appropriate loader to handle this file type.",
                slash_path
            )),
        };
    };

    let mut loaders = Vec::with_capacity(rule.loaders.len());
    for tag in &rule.loaders {
        let loader =
            Loader::from_tag(tag).ok_or_else(|| format!("Can't resolve loader '{}'", tag))?;
        loaders.push(loader);
    }

    loaders
        .iter()
        .rev()
        .try_fold(source, |acc, loader| loader.apply(path, acc))
}

fn compile_sass(path: &Path, source: &str) -> std::result::Result<String, String> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let syntax = match path.extension().and_then(|e| e.to_str()) {
        Some("sass") => grass::InputSyntax::Sass,
        Some("css") => grass::InputSyntax::Css,
        _ => grass::InputSyntax::Scss,
    };
    let options = grass::Options::default()
        .load_path(dir)
        .input_syntax(syntax)
        .quiet(true);
    grass::from_string(source.to_string(), &options).map_err(|e| e.to_string())
}

fn inject_style(module: &str) -> String {
    format!(
        r#"var __themekit_css__ = (function (module) {{
{}
return module.exports;
}})({{ exports: {{}} }});
if (typeof document !== "undefined") {{
  var style = document.createElement("style");
  style.textContent = String(__themekit_css__);
  document.head.appendChild(style);
}}
module.exports = {{}};
"#,
        module
    )
}

/// Removes TypeScript-only syntax, keeping every newline so output lines
/// still line up with the source.
///
/// This is a scanner, not a parser: it handles interfaces, type aliases,
/// `declare` and type-only import/export statements, annotations on
/// parameters and declarations, return types, `as` casts, class member
/// modifiers, `implements` clauses, call-site generics and non-null
/// assertions.
pub(crate) fn strip_types(source: &str) -> String {
    TypeStripper::new(source).run()
}

struct TypeStripper {
    chars: Vec<char>,
    out: String,
    i: usize,
    stack: Vec<char>,
    /// Last significant (non-space, non-comment) character emitted.
    last: Option<char>,
    /// A `class` keyword was seen and its body has not opened yet.
    class_pending: bool,
    /// Keyword that opened the current declaration (`let`, `const`, ...).
    decl: Option<String>,
    /// The current statement is an import or export.
    in_module_stmt: bool,
    /// Whitespace separated the last significant token from the cursor.
    spaced: bool,
}

impl TypeStripper {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            out: String::with_capacity(source.len()),
            i: 0,
            stack: Vec::new(),
            last: None,
            class_pending: false,
            decl: None,
            in_module_stmt: false,
            spaced: false,
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.i + offset).copied()
    }

    fn at_statement_start(&self) -> bool {
        matches!(self.last, None | Some(';') | Some('{') | Some('}'))
            || self.out.trim_end_matches([' ', '\t']).ends_with('\n')
    }

    fn emit(&mut self, c: char) {
        self.out.push(c);
        if !c.is_whitespace() {
            self.last = Some(c);
            self.spaced = false;
        } else {
            self.spaced = true;
        }
    }

    /// Drops `chars[from..to]`, keeping newlines.
    fn drop_range(&mut self, from: usize, to: usize) {
        let newlines = self.chars[from..to.min(self.chars.len())]
            .iter()
            .filter(|c| **c == '\n')
            .count();
        for _ in 0..newlines {
            self.out.push('\n');
        }
        if newlines > 0 {
            self.spaced = true;
        }
    }

    fn run(mut self) -> String {
        while self.i < self.chars.len() {
            let c = self.chars[self.i];
            match c {
                '"' | '\'' => self.copy_string(c),
                '`' => self.copy_template(),
                '/' if self.peek(1) == Some('/') => self.copy_line_comment(),
                '/' if self.peek(1) == Some('*') => self.copy_block_comment(),
                c if is_ident_start(c) => self.word(),
                ':' => self.colon(),
                '<' if self.last.is_some_and(is_ident_char) && !self.spaced => self.generic_args(),
                '!' if self.is_non_null_assertion() => self.i += 1,
                '?' if self.peek(1) == Some(':') && self.last.is_some_and(is_ident_char) => {
                    // Optional parameter or property marker.
                    if !(self.annotation_context() || self.stack.last() == Some(&'c')) {
                        self.emit(c);
                    }
                    self.i += 1;
                }
                '{' if self.class_pending => {
                    // Class bodies are tracked as 'c'.
                    self.class_pending = false;
                    self.stack.push('c');
                    self.emit(c);
                    self.i += 1;
                }
                '(' | '[' | '{' => {
                    self.stack.push(c);
                    self.emit(c);
                    self.i += 1;
                }
                ')' | ']' | '}' => {
                    self.stack.pop();
                    self.emit(c);
                    self.i += 1;
                }
                ';' => {
                    self.end_statement();
                    self.emit(c);
                    self.i += 1;
                }
                '\n' => {
                    if self.stack.is_empty() {
                        self.in_module_stmt = false;
                    }
                    self.emit(c);
                    self.i += 1;
                }
                _ => {
                    self.emit(c);
                    self.i += 1;
                }
            }
        }
        self.out
    }

    fn end_statement(&mut self) {
        self.decl = None;
        self.in_module_stmt = false;
        self.class_pending = false;
    }

    fn copy_string(&mut self, quote: char) {
        self.emit(quote);
        self.i += 1;
        while let Some(c) = self.peek(0) {
            self.out.push(c);
            self.i += 1;
            if c == '\\' {
                if let Some(next) = self.peek(0) {
                    self.out.push(next);
                    self.i += 1;
                }
            } else if c == quote || c == '\n' {
                break;
            }
        }
        self.last = Some(quote);
        self.spaced = false;
    }

    fn copy_template(&mut self) {
        self.emit('`');
        self.i += 1;
        let mut depth = 0usize;
        while let Some(c) = self.peek(0) {
            self.out.push(c);
            self.i += 1;
            match c {
                '\\' => {
                    if let Some(next) = self.peek(0) {
                        self.out.push(next);
                        self.i += 1;
                    }
                }
                '$' if self.peek(0) == Some('{') => {
                    self.out.push('{');
                    self.i += 1;
                    depth += 1;
                }
                '}' if depth > 0 => depth -= 1,
                '`' if depth == 0 => break,
                _ => {}
            }
        }
        self.last = Some('`');
        self.spaced = false;
    }

    fn copy_line_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.out.push(c);
            self.i += 1;
        }
    }

    fn copy_block_comment(&mut self) {
        self.out.push_str("/*");
        self.i += 2;
        while let Some(c) = self.peek(0) {
            self.out.push(c);
            self.i += 1;
            if c == '*' && self.peek(0) == Some('/') {
                self.out.push('/');
                self.i += 1;
                break;
            }
        }
    }

    fn read_word(&self, from: usize) -> (String, usize) {
        let mut end = from;
        while end < self.chars.len() && is_ident_char(self.chars[end]) {
            end += 1;
        }
        (self.chars[from..end].iter().collect(), end)
    }

    fn next_word_after(&self, from: usize) -> (String, usize) {
        let mut j = from;
        while j < self.chars.len() && self.chars[j].is_whitespace() {
            j += 1;
        }
        self.read_word(j)
    }

    fn word(&mut self) {
        let start = self.i;
        let (word, end) = self.read_word(start);
        let statement_start = self.at_statement_start();
        let (next, next_end) = self.next_word_after(end);

        if statement_start {
            match word.as_str() {
                "interface" if !next.is_empty() => {
                    let stop = self.skip_block_statement(next_end);
                    self.drop_range(start, stop);
                    self.i = stop;
                    return;
                }
                "type" if !next.is_empty() && self.followed_by_assign(next_end) => {
                    let stop = self.skip_type_alias(next_end);
                    self.drop_range(start, stop);
                    self.i = stop;
                    return;
                }
                "declare" if !next.is_empty() => {
                    let stop = self.skip_block_statement(end);
                    self.drop_range(start, stop);
                    self.i = stop;
                    return;
                }
                "import" if next == "type" => {
                    let stop = self.skip_simple_statement(end);
                    self.drop_range(start, stop);
                    self.i = stop;
                    return;
                }
                "export" if next == "type" || next == "interface" || next == "declare" => {
                    let after = self.skip_ws(next_end);
                    if next == "type" && self.chars.get(after) == Some(&'{') {
                        let stop = self.skip_simple_statement(end);
                        self.drop_range(start, stop);
                        self.i = stop;
                        return;
                    }
                    // Drop `export` and let the declaration be removed next.
                    self.drop_range(start, end);
                    self.i = self.skip_ws(end);
                    return;
                }
                "export" if is_exported_declaration(&next) => {}
                "import" | "export" => self.in_module_stmt = true,
                _ => {}
            }
        }

        match word.as_str() {
            "public" | "private" | "protected" | "readonly" | "abstract" | "override"
                if matches!(self.stack.last(), Some('c') | Some('('))
                    && (is_ident_start(next.chars().next().unwrap_or(' '))) =>
            {
                let stop = self.skip_ws(end);
                self.drop_range(start, stop);
                self.i = stop;
                return;
            }
            "implements" if self.last.is_some_and(is_ident_char) => {
                let mut stop = end;
                while stop < self.chars.len() && self.chars[stop] != '{' {
                    stop += 1;
                }
                self.drop_range(start, stop);
                self.i = stop;
                return;
            }
            "as" if !self.in_module_stmt
                && self.spaced
                && matches!(self.last, Some(c) if is_ident_char(c) || c == ')' || c == ']')
                && !next.is_empty() =>
            {
                let stop = self.skip_type(end);
                let kept = self.out.trim_end_matches([' ', '\t']).len();
                self.out.truncate(kept);
                self.drop_range(start, stop);
                self.i = stop;
                return;
            }
            "let" | "const" | "var" => self.decl = Some(word.clone()),
            "class" => self.class_pending = true,
            _ => {}
        }

        for c in word.chars() {
            self.emit(c);
        }
        self.i = end;
    }

    fn skip_ws(&self, from: usize) -> usize {
        let mut j = from;
        while j < self.chars.len() && self.chars[j].is_whitespace() {
            j += 1;
        }
        j
    }

    fn followed_by_assign(&self, from: usize) -> bool {
        let mut j = self.skip_ws(from);
        if self.chars.get(j) == Some(&'<') {
            j = self.skip_balanced(j, '<', '>');
            j = self.skip_ws(j);
        }
        self.chars.get(j) == Some(&'=')
    }

    fn skip_balanced(&self, from: usize, open: char, close: char) -> usize {
        let mut depth = 0usize;
        let mut j = from;
        while j < self.chars.len() {
            let c = self.chars[j];
            if c == open {
                depth += 1;
            } else if c == close {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return j + 1;
                }
            }
            j += 1;
        }
        j
    }

    /// End of a statement that may carry a `{ ... }` body.
    fn skip_block_statement(&self, from: usize) -> usize {
        let mut j = from;
        while j < self.chars.len() {
            match self.chars[j] {
                '{' => {
                    let end = self.skip_balanced(j, '{', '}');
                    return if self.chars.get(end) == Some(&';') { end + 1 } else { end };
                }
                ';' => return j + 1,
                '\n' if !self.chars[from..j].iter().any(|c| !c.is_whitespace()) => {}
                '\n' => return j,
                _ => {}
            }
            j += 1;
        }
        j
    }

    fn skip_simple_statement(&self, from: usize) -> usize {
        let mut j = from;
        let mut depth = 0usize;
        while j < self.chars.len() {
            match self.chars[j] {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                ';' if depth == 0 => return j + 1,
                '\n' if depth == 0 => return j,
                _ => {}
            }
            j += 1;
        }
        j
    }

    fn skip_type_alias(&self, from: usize) -> usize {
        let mut j = from;
        let mut depth = 0usize;
        while j < self.chars.len() {
            match self.chars[j] {
                '{' | '(' | '[' | '<' => depth += 1,
                '}' | ')' | ']' | '>' => depth = depth.saturating_sub(1),
                ';' if depth == 0 => return j + 1,
                '\n' if depth == 0 => {
                    let prev = self.chars[from..j]
                        .iter()
                        .rev()
                        .find(|c| !c.is_whitespace())
                        .copied();
                    let next = self.chars[j..].iter().find(|c| !c.is_whitespace()).copied();
                    let continues = matches!(prev, Some('=' | '|' | '&' | ','))
                        || matches!(next, Some('|' | '&'));
                    if !continues {
                        return j;
                    }
                }
                _ => {}
            }
            j += 1;
        }
        j
    }

    /// End of the type expression starting at `from`.
    fn skip_type(&self, from: usize) -> usize {
        let mut j = self.skip_ws(from);
        let starts_with_paren = self.chars.get(j) == Some(&'(');
        let mut depth = 0usize;
        let mut seen = false;
        while j < self.chars.len() {
            let c = self.chars[j];
            if depth == 0 {
                match c {
                    '=' if self.chars.get(j + 1) == Some(&'>') && starts_with_paren && seen => {
                        j += 2;
                        continue;
                    }
                    ',' | ';' | ')' | ']' | '}' | '=' | '\n' => return trim_back(&self.chars, from, j),
                    '{' if seen && !self.type_continues_before(from, j) => {
                        return trim_back(&self.chars, from, j)
                    }
                    _ => {}
                }
            }
            match c {
                '(' | '[' | '{' | '<' => depth += 1,
                ')' | ']' | '}' | '>' => {
                    if depth == 0 {
                        return trim_back(&self.chars, from, j);
                    }
                    depth -= 1;
                }
                _ => {}
            }
            if !c.is_whitespace() {
                seen = true;
            }
            j += 1;
        }
        j
    }

    fn type_continues_before(&self, from: usize, j: usize) -> bool {
        matches!(
            self.chars[from..j].iter().rev().find(|c| !c.is_whitespace()),
            Some('|' | '&' | ':')
        )
    }

    fn annotation_context(&self) -> bool {
        match self.stack.last() {
            Some('(') => true,
            _ => self.decl.is_some() && self.stack.is_empty(),
        }
    }

    fn colon(&mut self) {
        let c = ':';
        let after_ident = self.last.is_some_and(is_ident_char) && !self.spaced;

        if after_ident && self.annotation_context() && !self.in_module_stmt {
            let stop = self.skip_type(self.i + 1);
            self.drop_range(self.i, stop);
            self.i = stop;
            return;
        }

        if self.last == Some(')') {
            let stop = self.skip_type(self.i + 1);
            let rest = self.skip_ws(stop);
            let terminator = self.chars.get(rest).copied();
            let arrow = terminator == Some('=') && self.chars.get(rest + 1) == Some(&'>');
            if terminator == Some('{') || arrow {
                self.drop_range(self.i, stop);
                self.i = stop;
                return;
            }
        }

        if after_ident && self.stack.last() == Some(&'c') {
            // Class property: `name: Type;` or `name: Type = value;`
            let stop = self.skip_type(self.i + 1);
            let rest = self.skip_ws(stop);
            let terminator = self.chars.get(rest).copied();
            let assign = terminator == Some('=') && self.chars.get(rest + 1) != Some(&'>');
            if terminator == Some(';') || assign {
                self.drop_range(self.i, stop);
                self.i = stop;
                return;
            }
        }

        self.emit(c);
        self.i += 1;
    }

    fn generic_args(&mut self) {
        let end = self.skip_balanced(self.i, '<', '>');
        let inner = &self.chars[self.i..end];
        let type_like = inner.iter().all(|c| {
            is_ident_char(*c) || c.is_whitespace() || matches!(c, '<' | '>' | ',' | '.' | '[' | ']' | '|' | '&')
        });
        if type_like && self.chars.get(end) == Some(&'(') {
            self.drop_range(self.i, end);
            self.i = end;
        } else {
            self.emit('<');
            self.i += 1;
        }
    }

    fn is_non_null_assertion(&self) -> bool {
        let prev_ok = matches!(self.last, Some(c) if is_ident_char(c) || c == ')' || c == ']')
            && !self.spaced;
        let next = self.peek(1);
        prev_ok && matches!(next, Some('.' | ')' | ';' | ',' | '[')) && next != Some('=')
    }
}

fn trim_back(chars: &[char], from: usize, j: usize) -> usize {
    let mut end = j;
    while end > from && chars[end - 1].is_whitespace() && chars[end - 1] != '\n' {
        end -= 1;
    }
    end
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

/// `export` followed by a declaration keeps the declaration's own
/// annotation handling; only re-export lists are module syntax.
fn is_exported_declaration(next: &str) -> bool {
    matches!(
        next,
        "function" | "class" | "const" | "let" | "var" | "default" | "async" | "abstract" | "enum"
    )
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
