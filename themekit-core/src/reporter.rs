//! Terminal reporter for banners, task headers and status lines.

use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};

use owo_colors::OwoColorize;

/// Semantic annotation of a reported line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Banner,
}

/// Presentation hint; dropped when the sink does not support color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorHint {
    Cyan,
    Red,
    Green,
}

impl Level {
    fn symbol(&self) -> Option<&'static str> {
        match self {
            Level::Info | Level::Banner => None,
            Level::Warn => Some("⚠"),
            Level::Error => Some("✗"),
        }
    }

    fn default_color(&self) -> Option<ColorHint> {
        match self {
            Level::Error => Some(ColorHint::Red),
            _ => None,
        }
    }
}

/// The single output sink of a run.
pub struct Reporter {
    sink: Mutex<Box<dyn Write + Send>>,
    color: bool,
}

impl Reporter {
    pub fn new(sink: Box<dyn Write + Send>, color: bool) -> Self {
        Self {
            sink: Mutex::new(sink),
            color,
        }
    }

    /// Reporter on stdout. Color is only used when stdout is a terminal.
    pub fn stdout(color: bool) -> Self {
        let color = color && io::stdout().is_terminal();
        Self::new(Box::new(io::stdout()), color)
    }

    /// Uncolored reporter writing into memory, for tests.
    pub fn memory() -> (Self, MemorySink) {
        let sink = MemorySink::default();
        (Self::new(Box::new(sink.clone()), false), sink)
    }

    /// Writes one annotated line.
    pub fn line(&self, level: Level, hint: Option<ColorHint>, text: &str) {
        let body = match level.symbol() {
            Some(symbol) => format!("{} {}", symbol, text),
            None => text.to_string(),
        };
        let rendered = match (self.color, hint.or_else(|| level.default_color())) {
            (true, Some(ColorHint::Cyan)) => body.cyan().to_string(),
            (true, Some(ColorHint::Red)) => body.red().to_string(),
            (true, Some(ColorHint::Green)) => body.green().to_string(),
            (true, None) if level == Level::Warn => body.yellow().to_string(),
            _ => body,
        };
        self.write_line(&rendered);
    }

    pub fn info(&self, text: &str) {
        self.line(Level::Info, None, text);
    }

    pub fn warn(&self, text: &str) {
        self.line(Level::Warn, None, text);
    }

    pub fn error(&self, text: &str) {
        self.line(Level::Error, None, text);
    }

    pub fn banner(&self, text: &str, hint: Option<ColorHint>) {
        self.line(Level::Banner, hint, text);
    }

    /// Success line, e.g. `✓ 3 files created.`
    pub fn ok(&self, text: &str) {
        self.line(Level::Info, Some(ColorHint::Green), &format!("✓ {}", text));
    }

    /// Header printed before each leaf invocation.
    pub fn task_header(&self, invocation: &str, tool: &str) {
        let header = format!("Running \"{}\" ({}) task", invocation, tool);
        self.write_line("");
        if self.color {
            self.write_line(&header.underline().to_string());
        } else {
            self.write_line(&header);
        }
    }

    /// Final line of a run.
    pub fn finish(&self, success: bool) {
        self.write_line("");
        if success {
            self.line(Level::Info, Some(ColorHint::Green), "Done.");
        } else {
            self.line(Level::Warn, None, "Aborted due to errors.");
        }
    }

    fn write_line(&self, text: &str) {
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "{}", text);
            let _ = sink.flush();
        }
    }
}

/// Shared in-memory buffer implementing `Write`.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reporter_is_plain() {
        let (reporter, sink) = Reporter::memory();
        reporter.banner("# Project : demo", Some(ColorHint::Cyan));
        reporter.warn("careful");
        reporter.error("broken");

        let out = sink.contents();
        assert!(out.contains("# Project : demo\n"));
        assert!(out.contains("⚠ careful\n"));
        assert!(out.contains("✗ broken\n"));
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn test_colored_banner() {
        let sink = MemorySink::default();
        let reporter = Reporter::new(Box::new(sink.clone()), true);
        reporter.banner("hello", Some(ColorHint::Green));
        assert!(sink.contents().contains('\u{1b}'));
    }

    #[test]
    fn test_task_header_and_finish() {
        let (reporter, sink) = Reporter::memory();
        reporter.task_header("sass:compile", "sass");
        reporter.finish(false);
        let out = sink.contents();
        assert!(out.contains("Running \"sass:compile\" (sass) task"));
        assert!(out.contains("Aborted due to errors."));
    }
}
