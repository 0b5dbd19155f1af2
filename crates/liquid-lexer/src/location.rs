use serde::Serialize;

/// A region of template source, carried by every segment, AST node and error.
///
/// `offset` and `length` are UTF-8 byte positions into the source.
/// `line` and `column` are 1-based; the column counts characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub length: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize, offset: usize, length: usize) -> Self {
        Self {
            line,
            column,
            offset,
            length,
        }
    }

    /// Byte offset one past the end of this location.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Maps byte offsets to line/column pairs.
///
/// Built once per source text; lookups are a binary search over line starts.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            source,
            line_starts,
        }
    }

    /// 1-based `(line, column)` of a byte offset. Offsets past the end clamp to the end.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = self.clamp(offset);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let column = self.source[start..offset].chars().count() + 1;
        (line + 1, column)
    }

    /// Build a location for `length` bytes starting at `offset`, clamped to the source.
    pub fn location(&self, offset: usize, length: usize) -> SourceLocation {
        let offset = self.clamp(offset);
        let length = length.min(self.source.len() - offset);
        let (line, column) = self.line_col(offset);
        SourceLocation::new(line, column, offset, length)
    }

    /// Build a location covering `start..end`.
    pub fn span(&self, start: usize, end: usize) -> SourceLocation {
        self.location(start, end.saturating_sub(start))
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    fn clamp(&self, offset: usize) -> usize {
        let mut offset = offset.min(self.source.len());
        while !self.source.is_char_boundary(offset) {
            offset -= 1;
        }
        offset
    }
}
