//! Source positions and spans.
//!
//! Scripts in this crate's subset are small, so unlike a JavaScript AST built
//! for repeated reparsing of large files, nodes here carry human-readable
//! `(line, column)` positions directly rather than byte offsets into an
//! arena-owned source buffer. Line numbers are 1-based, columns are 0-based,
//! matching the convention of Python's own `ast` module (and so the error
//! messages and line maps downstream read the way a script author expects).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single point in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    /// 1-based line number.
    pub line: u32,
    /// 0-based column offset, in UTF-8 bytes from the start of the line.
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A range in source text, from `start` (inclusive) to `end` (exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-width span at a single position, used for synthesized nodes
    /// that have no direct source representation.
    pub const fn point(pos: Position) -> Self {
        Self { start: pos, end: pos }
    }
}

/// Implemented by every AST node so checkers and the line mapper can recover
/// its source location without a big match on node kind.
pub trait GetSpan {
    fn span(&self) -> Span;
}

/// Source text split into physical lines plus the byte-offset index needed
/// to convert a [`Position`] into a `miette::SourceSpan` for diagnostics.
///
/// Lines are stored without their trailing newline, mirroring Python's
/// `str.splitlines()` (which is what the implementation this crate is based
/// on uses to build `source_lines`).
#[derive(Debug, Clone)]
pub struct SourceText {
    text: String,
    lines: Vec<String>,
    line_byte_offsets: Vec<usize>,
}

impl SourceText {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let lines: Vec<String> = split_lines(&text);
        let mut line_byte_offsets = Vec::with_capacity(lines.len() + 1);
        let mut offset = 0usize;
        for line in &lines {
            line_byte_offsets.push(offset);
            offset += line.len() + 1; // +1 for the newline we stripped
        }
        line_byte_offsets.push(text.len());
        Self { text, lines, line_byte_offsets }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the text of a single 1-based line, if in range.
    pub fn line(&self, line_number: u32) -> Option<&str> {
        self.lines.get(line_number.checked_sub(1)? as usize).map(String::as_str)
    }

    /// Converts a [`Position`] to a byte offset into the original text, for
    /// building `miette` labels. Positions past the end of the text clamp to
    /// the text's length rather than panicking, since diagnostics sometimes
    /// point one line past a truncated file (e.g. "unexpected end of input").
    pub fn offset_of(&self, pos: Position) -> usize {
        let Some(&line_start) = self.line_byte_offsets.get(pos.line.saturating_sub(1) as usize)
        else {
            return self.text.len();
        };
        let line_len = self.line(pos.line).map_or(0, str::len);
        line_start + (pos.column as usize).min(line_len)
    }

    /// Converts a [`Span`] to a `(start, len)` byte range usable as a
    /// `miette::SourceSpan`.
    pub fn offset_range(&self, span: Span) -> (usize, usize) {
        let start = self.offset_of(span.start);
        let end = self.offset_of(span.end).max(start);
        (start, end - start)
    }

    /// Renders a `context` lines of source around `line_number` on either
    /// side, marking the offending line with `>`, matching the error
    /// formatting every `ExecutionError` shows the caller.
    pub fn context_display(&self, line_number: u32, context: u32) -> String {
        let first = line_number.saturating_sub(context).max(1);
        let last = (line_number + context).min(self.line_count() as u32);
        let mut out = String::new();
        for n in first..=last {
            let marker = if n == line_number { '>' } else { ' ' };
            let text = self.line(n).unwrap_or_default();
            out.push_str(&format!("{marker} {n:>4} | {text}\n"));
        }
        out
    }
}

fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    text.split('\n').map(|s| s.strip_suffix('\r').unwrap_or(s).to_owned()).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_and_indexes_lines() {
        let src = SourceText::new("a = 1\nb = 2\n");
        assert_eq!(src.line_count(), 3);
        assert_eq!(src.line(1), Some("a = 1"));
        assert_eq!(src.line(2), Some("b = 2"));
        assert_eq!(src.line(3), Some(""));
    }

    #[test]
    fn offset_of_clamps_to_line_length() {
        let src = SourceText::new("short\nlonger line\n");
        let (start, len) = src.offset_range(Span::new(Position::new(1, 0), Position::new(1, 999)));
        assert_eq!(start, 0);
        assert_eq!(len, "short".len());
    }

    #[test]
    fn context_display_marks_offending_line() {
        let src = SourceText::new("one\ntwo\nthree\nfour\nfive\n");
        let out = src.context_display(3, 1);
        assert!(out.contains(">    3 | three"));
        assert!(out.contains("     2 | two"));
        assert!(out.contains("     4 | four"));
    }
}
