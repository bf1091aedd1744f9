use std::fmt;

use serde::Serialize;

/// A source position: 1-based line and column.
///
/// Every node of the tree carries one. Positions synthesized by the
/// compiler itself (for generated temporaries and helper calls) reuse the
/// position of the construct they were generated for, so diagnostics
/// raised against generated code still point at user source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Whether this position is the placeholder for "no source location".
    pub fn is_unknown(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Pre-computed index of line start positions.
///
/// Converts between byte offsets (what the lexer produces) and
/// line/column positions (what the tree stores), in both directions.
#[derive(Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self {
            line_starts,
            len: source.len() as u32,
        }
    }

    /// Convert a byte offset to a 1-based position.
    pub fn position(&self, offset: u32) -> Position {
        let line_idx = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        Position {
            line: line_idx as u32 + 1,
            column: offset - self.line_starts[line_idx] + 1,
        }
    }

    /// Convert a position back to a byte offset, clamped to the source.
    ///
    /// Unknown positions map to offset 0.
    pub fn offset(&self, pos: Position) -> u32 {
        if pos.is_unknown() {
            return 0;
        }
        let line_idx = (pos.line as usize - 1).min(self.line_starts.len() - 1);
        let start = self.line_starts[line_idx];
        (start + pos.column.saturating_sub(1)).min(self.len)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}
