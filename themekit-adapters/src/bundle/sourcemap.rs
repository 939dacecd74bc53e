//! Line-granular source maps (revision 3).

use serde_json::json;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Appends the base64 VLQ encoding of `value` to `out`.
pub(crate) fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Collects one mapping per generated line.
#[derive(Debug, Default)]
pub(crate) struct SourceMapBuilder {
    sources: Vec<String>,
    contents: Vec<String>,
    lines: Vec<Option<(usize, usize)>>,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source and returns its index.
    pub fn add_source(&mut self, name: String, content: String) -> usize {
        self.sources.push(name);
        self.contents.push(content);
        self.sources.len() - 1
    }

    /// Records a generated line with no original position.
    pub fn unmapped_line(&mut self) {
        self.lines.push(None);
    }

    /// Records a generated line originating from `line` (0-based) of `source`.
    pub fn mapped_line(&mut self, source: usize, line: usize) {
        self.lines.push(Some((source, line)));
    }

    pub fn mappings(&self) -> String {
        let mut out = String::new();
        let mut prev_source = 0i64;
        let mut prev_line = 0i64;
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            if let Some((source, original)) = line {
                let source = *source as i64;
                let original = *original as i64;
                encode_vlq(0, &mut out);
                encode_vlq(source - prev_source, &mut out);
                encode_vlq(original - prev_line, &mut out);
                encode_vlq(0, &mut out);
                prev_source = source;
                prev_line = original;
            }
        }
        out
    }

    pub fn to_json(&self, file: &str) -> String {
        json!({
            "version": 3,
            "file": file,
            "sources": self.sources,
            "sourcesContent": self.contents,
            "names": [],
            "mappings": self.mappings(),
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(value: i64) -> String {
        let mut out = String::new();
        encode_vlq(value, &mut out);
        out
    }

    #[test]
    fn test_vlq_known_values() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(15), "e");
        assert_eq!(vlq(16), "gB");
        assert_eq!(vlq(123), "2H");
    }

    #[test]
    fn test_mappings_are_relative() {
        let mut builder = SourceMapBuilder::new();
        let a = builder.add_source("a.js".to_string(), String::new());
        builder.unmapped_line();
        builder.mapped_line(a, 0);
        builder.mapped_line(a, 1);
        assert_eq!(builder.mappings(), ";AAAA;AACA");
    }
}
