//! Source positions and spans, detached from the source buffer.
//!
//! The parser annotates every node with a `Span`. The semantic core only
//! carries spans around for diagnostics; it never re-derives source text,
//! so positions are plain line/column pairs instead of offsets into a
//! memory-mapped file.

use std::fmt;

/// A caret position in the source, 1-based for both coordinates, the way
/// editors and diagnostics conventionally count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.line, self.column)
    }
}

/// A contiguous source region `[start, end]` (inclusive on both sides).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert!(start <= end, "span must not be inverted");
        Span { start, end }
    }

    /// Single-position span, handy for punctuation-sized nodes.
    pub fn at(line: u32, column: u32) -> Self {
        let pos = Position::new(line, column);
        Span {
            start: pos,
            end: pos,
        }
    }

    pub fn is_multiline(&self) -> bool {
        self.start.line != self.end.line
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else if self.is_multiline() {
            write!(f, "{}-{}", self.start, self.end)
        } else {
            // same line, abbreviate the end like `3.7-9`
            write!(f, "{}-{}", self.start, self.end.column)
        }
    }
}
