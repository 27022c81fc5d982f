use serde::Serialize;

/// Half-open byte range into the source text of one module.
///
/// Every AST node, token, and issue carries one of these. Line and column
/// numbers are not stored; they are derived on demand through [`LineIndex`]
/// when a diagnostic is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Create a span from byte offsets.
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start ({start}) must be <= end ({end})");
        Self { start, end }
    }

    /// A zero-length span at the given offset.
    pub fn point(at: u32) -> Self {
        Self { start: at, end: at }
    }

    /// Length in bytes.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Convert to a `Range<usize>` for slicing source text or feeding ariadne.
    pub fn to_range(self) -> std::ops::Range<usize> {
        self.start as usize..self.end as usize
    }
}

/// Line-start offsets of a source file, for offset -> (line, column) lookup.
///
/// Built once per module and consulted only when an issue is rendered.
#[derive(Debug)]
pub struct LineIndex {
    /// Byte offset of the first character of each line; first entry is 0.
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Scan the source once, recording where each line begins.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// 1-based (line, column) of a byte offset. Column counts bytes.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let idx = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        ((idx as u32) + 1, offset - self.line_starts[idx] + 1)
    }

    /// Number of lines in the indexed source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_basics() {
        let span = Span::new(4, 9);
        assert_eq!(span.len(), 5);
        assert!(!span.is_empty());
        assert!(Span::point(3).is_empty());
    }

    #[test]
    fn span_merge_covers_both() {
        let merged = Span::new(2, 6).merge(Span::new(10, 12));
        assert_eq!(merged, Span::new(2, 12));
    }

    #[test]
    fn span_to_range_slices_source() {
        let src = "let x = 42";
        assert_eq!(&src[Span::new(4, 5).to_range()], "x");
    }

    #[test]
    fn line_index_single_line() {
        let idx = LineIndex::new("hello");
        assert_eq!(idx.line_col(0), (1, 1));
        assert_eq!(idx.line_col(4), (1, 5));
        assert_eq!(idx.line_count(), 1);
    }

    #[test]
    fn line_index_multiple_lines() {
        let idx = LineIndex::new("let a = 1\nlet b = 2\n");
        assert_eq!(idx.line_col(0), (1, 1));
        assert_eq!(idx.line_col(10), (2, 1));
        assert_eq!(idx.line_col(14), (2, 5));
        assert_eq!(idx.line_count(), 3);
    }

    #[test]
    fn line_index_offset_on_newline() {
        let idx = LineIndex::new("ab\ncd");
        assert_eq!(idx.line_col(2), (1, 3));
        assert_eq!(idx.line_col(3), (2, 1));
    }
}
