use std::fmt;

use serde::Serialize;

/// A 1-based line and column position within a template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LineCol {
    line: u32,
    column: u32,
}

impl LineCol {
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn column(&self) -> u32 {
        self.column
    }
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Byte offsets of every line start in a source text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    length: u32,
}

impl LineIndex {
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut line_starts = vec![0];
        let mut pos = 0u32;

        for c in text.chars() {
            pos += u32::try_from(c.len_utf8()).unwrap_or(0);
            if c == '\n' {
                line_starts.push(pos);
            }
        }

        Self {
            line_starts,
            length: pos,
        }
    }

    /// Convert a byte offset to a 1-based line/column pair.
    ///
    /// Offsets past the end of the text clamp to the last position. An index
    /// built from no text reports every offset on line 1.
    #[must_use]
    pub fn line_col(&self, offset: u32) -> LineCol {
        let offset = offset.min(self.length);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);

        LineCol::new(
            u32::try_from(line + 1).unwrap_or(u32::MAX),
            offset - line_start + 1,
        )
    }
}

/// A byte range in a template source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    start: u32,
    length: u32,
}

impl Span {
    #[must_use]
    pub fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    /// Offsets past `u32::MAX` saturate.
    #[must_use]
    pub fn from_parts(start: usize, length: usize) -> Self {
        let start = u32::try_from(start).unwrap_or(u32::MAX);
        let length = u32::try_from(length).map_or(u32::MAX - start, |length| {
            length.min(u32::MAX - start)
        });
        Self::new(start, length)
    }

    /// The span from `start` up to `end`; empty when `end` precedes `start`.
    #[must_use]
    pub fn from_bounds(start: usize, end: usize) -> Self {
        Self::from_parts(start, end.saturating_sub(start))
    }

    /// Where a synthetic node inserted at `offset` lives.
    #[must_use]
    pub fn empty_at(offset: u32) -> Self {
        Self::new(offset, 0)
    }

    #[must_use]
    pub fn start(self) -> u32 {
        self.start
    }

    #[must_use]
    pub fn end(self) -> u32 {
        self.start + self.length
    }

    #[must_use]
    pub fn start_usize(self) -> usize {
        self.start as usize
    }

    #[must_use]
    pub fn length_usize(self) -> usize {
        self.length as usize
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.length == 0
    }
}
