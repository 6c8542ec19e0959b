use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Byte range in a named source file, with 1-based inclusive line numbers when known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub file: String,
    pub start: usize,
    pub len: usize,
    pub lines: Option<(u32, u32)>,
}

impl SourceSpan {
    pub fn new(file: impl Into<String>, start: usize, len: usize) -> Self {
        Self {
            file: file.into(),
            start,
            len,
            lines: None,
        }
    }

    pub fn with_lines(mut self, start_line: u32, end_line: u32) -> Self {
        self.lines = Some((start_line, end_line));
        self
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.len)
    }

    /// Parses a compiler `src` attribute (`start:length:fileIndex`).
    ///
    /// `files` maps source indices to names; an unknown index falls back to `default_file`.
    pub fn from_src_attribute(src: &str, files: &[String], default_file: &str) -> Option<Self> {
        let mut parts = src.split(':');
        let start = parts.next()?.parse::<usize>().ok()?;
        let len = parts.next()?.parse::<usize>().ok()?;
        let file = parts
            .next()
            .and_then(|idx| idx.parse::<usize>().ok())
            .and_then(|idx| files.get(idx))
            .map(String::as_str)
            .unwrap_or(default_file);
        Some(Self::new(file, start, len))
    }
}

/// Source texts of a compilation, keyed by file name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceFiles {
    texts: IndexMap<String, String>,
}

impl SourceFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: impl Into<String>, text: impl Into<String>) {
        self.texts.insert(file.into(), text.into());
    }

    pub fn get(&self, file: &str) -> Option<&str> {
        self.texts.get(file).map(String::as_str)
    }

    pub fn contains(&self, file: &str) -> bool {
        self.texts.contains_key(file)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.texts.keys().map(String::as_str)
    }

    pub fn snippet(&self, span: &SourceSpan) -> Option<&str> {
        let text = self.get(&span.file)?;
        if let Some(slice) = text.get(span.start..span.end()) {
            if span.len > 0 {
                return Some(slice);
            }
        }
        let (first, last) = span.lines?;
        let start = line_start(text, first)?;
        let end = line_start(text, last + 1).unwrap_or(text.len());
        text.get(start..end).map(|s| s.trim_end_matches('\n'))
    }

    /// Line range covered by a span, computed from byte offsets when not recorded.
    pub fn line_range(&self, span: &SourceSpan) -> Option<(u32, u32)> {
        if let Some(lines) = span.lines {
            return Some(lines);
        }
        let text = self.get(&span.file)?;
        if span.end() > text.len() {
            return None;
        }
        let first = line_of(text, span.start);
        let last = line_of(text, span.end().saturating_sub(1).max(span.start));
        Some((first, last))
    }
}

fn line_of(text: &str, offset: usize) -> u32 {
    let prefix = &text.as_bytes()[..offset.min(text.len())];
    prefix.iter().filter(|b| **b == b'\n').count() as u32 + 1
}

fn line_start(text: &str, line: u32) -> Option<usize> {
    if line <= 1 {
        return Some(0);
    }
    text.match_indices('\n')
        .nth(line as usize - 2)
        .map(|(idx, _)| idx + 1)
}
