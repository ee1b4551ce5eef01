//! Source location tracking for diagnostics.
//!
//! Every expression node and table entry carries a [`Span`] attached by the
//! external parser. Spans stay compact; all lookup goes through a
//! [`SourceMap`] owned by the caller.
//!
//! # Examples
//!
//! ```
//! # use props_core::foundation::span::*;
//! # use std::path::PathBuf;
//! let mut map = SourceMap::new();
//! let file_id = map.add_file(PathBuf::from("sweep.props"), "const int n;\nP=? [ F \"done\" ]".to_string());
//! let span = Span::new(file_id, 10, 11, 1);
//!
//! assert_eq!(map.snippet(&span), "n");
//! assert_eq!(map.line_col(&span), (1, 11));
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Compact source location reference.
///
/// Points to a byte range in a source file with a cached line number so
/// error messages can be produced without a line-index lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Index into SourceMap.files
    pub file_id: u16,
    /// Byte offset of start position
    pub start: u32,
    /// Byte offset of end position (exclusive)
    pub end: u32,
    /// Cached line number (1-based) for the start position
    pub start_line: u16,
}

impl Span {
    /// Create a new span.
    pub fn new(file_id: u16, start: u32, end: u32, start_line: u16) -> Self {
        Self {
            file_id,
            start,
            end,
            start_line,
        }
    }

    /// Create a zero-length span at the start of a file.
    ///
    /// Used for synthesized entries that have no source text, e.g. labels
    /// copied from the model scope into the combined view.
    pub fn zero(file_id: u16) -> Self {
        Self::new(file_id, 0, 0, 1)
    }

    /// Check if this span is zero-length.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Get the length of this span in bytes.
    ///
    /// # Panics
    /// Panics if end < start (malformed span).
    pub fn len(&self) -> u32 {
        assert!(
            self.end >= self.start,
            "malformed span: end ({}) < start ({})",
            self.end,
            self.start
        );
        self.end - self.start
    }

    /// Merge two spans (returns span covering both).
    ///
    /// Panics if spans are from different files.
    pub fn merge(&self, other: &Span) -> Span {
        assert_eq!(
            self.file_id, other.file_id,
            "cannot merge spans from different files"
        );
        Span {
            file_id: self.file_id,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            start_line: self.start_line.min(other.start_line),
        }
    }
}

/// Collection of all source files seen by the parser.
///
/// Converts spans into human-readable locations and snippets. A properties
/// source and its model-description source are typically two entries in the
/// same map, so diagnostics from either scope format uniformly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

/// A single source file with line indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Absolute or relative path to this file
    pub path: PathBuf,
    /// Original source text
    pub source: String,
    /// Byte offsets of each line start
    ///
    /// line_starts[0] is always 0 (start of file).
    pub line_starts: Vec<u32>,
}

impl SourceMap {
    /// Create an empty source map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source file and return its file id.
    pub fn add_file(&mut self, path: PathBuf, source: String) -> u16 {
        let id = self.files.len() as u16;
        self.files.push(SourceFile::new(path, source));
        id
    }

    /// Get the file a span points into.
    ///
    /// # Panics
    /// Panics if the span's file id is out of range.
    pub fn file(&self, span: &Span) -> &SourceFile {
        &self.files[span.file_id as usize]
    }

    /// Get the path of the file a span points into.
    pub fn file_path(&self, span: &Span) -> &Path {
        &self.file(span).path
    }

    /// Get the source text covered by a span.
    pub fn snippet(&self, span: &Span) -> &str {
        &self.file(span).source[span.start as usize..span.end as usize]
    }

    /// Get (line, column) for the start of a span, both 1-based.
    pub fn line_col(&self, span: &Span) -> (u32, u32) {
        let file = self.file(span);
        let line = file.line_of(span.start);
        let col = span.start - file.line_starts[(line - 1) as usize] + 1;
        (line, col)
    }
}

impl SourceFile {
    fn new(path: PathBuf, source: String) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self {
            path,
            source,
            line_starts,
        }
    }

    /// 1-based line number containing a byte offset.
    fn line_of(&self, offset: u32) -> u32 {
        match self.line_starts.binary_search(&offset) {
            Ok(i) => i as u32 + 1,
            Err(i) => i as u32,
        }
    }

    /// Get the text of a 1-based line, without the trailing newline.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let idx = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(idx)? as usize;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&e| e as usize)
            .unwrap_or(self.source.len());
        Some(self.source[start..end].trim_end_matches('\n'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_map() -> SourceMap {
        let mut map = SourceMap::new();
        map.add_file(
            PathBuf::from("test.props"),
            "const int n;\nlabel \"safe\" = x < 3;".to_string(),
        );
        map
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(0, 2, 5, 1);
        let b = Span::new(0, 4, 9, 1);
        let merged = a.merge(&b);
        assert_eq!(merged.start, 2);
        assert_eq!(merged.end, 9);
    }

    #[test]
    fn test_snippet() {
        let map = test_map();
        let span = Span::new(0, 10, 11, 1);
        assert_eq!(map.snippet(&span), "n");
    }

    #[test]
    fn test_line_col_second_line() {
        let map = test_map();
        // "label" starts at byte 13, line 2
        let span = Span::new(0, 13, 18, 2);
        assert_eq!(map.line_col(&span), (2, 1));
        assert_eq!(map.snippet(&span), "label");
    }

    #[test]
    fn test_line_text() {
        let map = test_map();
        let span = Span::new(0, 0, 5, 1);
        let file = map.file(&span);
        assert_eq!(file.line_text(1), Some("const int n;"));
        assert_eq!(file.line_text(2), Some("label \"safe\" = x < 3;"));
        assert_eq!(file.line_text(3), None);
    }

    #[test]
    fn test_zero_span() {
        let span = Span::zero(0);
        assert!(span.is_empty());
        assert_eq!(span.len(), 0);
    }
}
