//! Source text storage and exact-span extraction.
//!
//! Every expression node carries a byte [`Span`] into the file it was parsed
//! from. Replacement text is assembled by slicing the original bytes for a
//! span, so extraction must be exact: what the author wrote, parentheses and
//! spacing included. Extraction is refused (returns `None`) for spans that
//! are tainted by macro expansion or that cross file boundaries -- rewriting
//! those would splice text the author never wrote in one place.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// A half-open byte range `[start, end)` into one file's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {} past end {}", start, end);
        Self { start, end }
    }

    /// Whether `other` lies entirely within this span (bounds inclusive).
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A text range in a file (1-indexed lines and columns), for human-readable
/// diagnostics. Columns count bytes from the start of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

/// One translation unit's source text plus its line-start table.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    text: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx + 1);
            }
        }
        Self {
            path: path.into(),
            text,
            line_starts,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Slice the exact original text covering `span`.
    ///
    /// Returns `None` when the span falls outside the file or does not land
    /// on UTF-8 character boundaries. Callers that hold an expression node
    /// should go through [`SourceFile::snippet`], which also honors the
    /// node's macro and multi-file taint flags.
    pub fn slice(&self, span: Span) -> Option<&str> {
        self.text.get(span.start..span.end)
    }

    /// Extract the original text for an expression node, or `None` when the
    /// node's tokens cannot be attributed to one contiguous region of this
    /// file (macro expansion, multi-file span).
    pub fn snippet(&self, expr: &crate::tree::Expr) -> Option<&str> {
        if expr.from_macro || expr.multi_file {
            return None;
        }
        self.slice(expr.span)
    }

    /// Convert a byte offset to a 1-indexed (line, column) pair.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        (line_idx + 1, offset - self.line_starts[line_idx] + 1)
    }

    /// Convert a byte span to a human-readable [`Range`].
    pub fn range(&self, span: Span) -> Range {
        let (start_line, start_col) = self.line_col(span.start);
        let (end_line, end_col) = self.line_col(span.end);
        Range {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Expr, ExprKind};

    fn expr_at(start: usize, end: usize) -> Expr {
        Expr::new(ExprKind::Opaque { children: vec![] }, Span::new(start, end))
    }

    #[test]
    fn slice_returns_exact_text() {
        let file = SourceFile::new("t.c", "int x = a + b;");
        assert_eq!(file.slice(Span::new(8, 13)), Some("a + b"));
    }

    #[test]
    fn slice_out_of_bounds_is_none() {
        let file = SourceFile::new("t.c", "abc");
        assert_eq!(file.slice(Span::new(1, 10)), None);
    }

    #[test]
    fn snippet_refuses_macro_tainted_nodes() {
        let file = SourceFile::new("t.c", "a + b");
        let mut expr = expr_at(0, 5);
        assert_eq!(file.snippet(&expr), Some("a + b"));
        expr.from_macro = true;
        assert_eq!(file.snippet(&expr), None);
    }

    #[test]
    fn snippet_refuses_multi_file_nodes() {
        let file = SourceFile::new("t.c", "a + b");
        let mut expr = expr_at(0, 5);
        expr.multi_file = true;
        assert_eq!(file.snippet(&expr), None);
    }

    #[test]
    fn line_col_is_one_indexed() {
        let file = SourceFile::new("t.c", "ab\ncd\nef");
        assert_eq!(file.line_col(0), (1, 1));
        assert_eq!(file.line_col(3), (2, 1));
        assert_eq!(file.line_col(7), (3, 2));
    }

    #[test]
    fn range_spans_lines() {
        let file = SourceFile::new("t.c", "ab\ncd\nef");
        let range = file.range(Span::new(1, 4));
        assert_eq!(range.start_line, 1);
        assert_eq!(range.start_col, 2);
        assert_eq!(range.end_line, 2);
        assert_eq!(range.end_col, 2);
    }
}
