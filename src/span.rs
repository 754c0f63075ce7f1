//! Source code location tracking
//!
//! Positions and ranges are attached to every token and tree node and
//! travel with diagnostics all the way to the driver.

use std::fmt;

/// A position in the source code (line and column, both 0-indexed).
///
/// A newline advances the line and resets the column to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// A range in the source code, from the first character of a token to
/// one past its last character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Range {
    pub begin: Position,
    pub end: Position,
}

impl Range {
    pub fn new(begin: Position, end: Position) -> Self {
        Self { begin, end }
    }

    /// Merge two ranges into one that covers both.
    pub fn merge(self, other: Range) -> Range {
        let begin = if (other.begin.line, other.begin.column) < (self.begin.line, self.begin.column)
        {
            other.begin
        } else {
            self.begin
        };
        let end = if (other.end.line, other.end.column) > (self.end.line, self.end.column) {
            other.end
        } else {
            self.end
        };
        Range { begin, end }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.begin)
    }
}

/// A file name together with a range inside that file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub file: String,
    pub range: Range,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, range: Range) -> Self {
        Self {
            file: file.into(),
            range,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.range)
    }
}
