//! Conversion between byte offsets and LSP positions.
//!
//! Detection works in byte offsets; the protocol speaks in UTF-16 line and
//! character coordinates. A [`LineIndex`] is built from the document text
//! whenever a request needs to convert, and discarded with the request.

use lsp_types::{Position, Range};

/// Line start table for one version of a document's text.
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> LineIndex<'a> {
        let mut line_starts = vec![0];
        for (pos, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(pos + 1);
            }
        }
        LineIndex { text, line_starts }
    }

    /// Zero-based line containing `offset`.
    pub fn line_of(&self, offset: usize) -> u32 {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line as u32,
            Err(next) => (next - 1) as u32,
        }
    }

    /// Convert a byte offset to an LSP position. Offsets past the end of
    /// the text clamp to the end.
    pub fn position_of(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = self.line_of(offset);
        let line_start = self.line_starts[line as usize];
        let character = self.text[line_start..offset]
            .chars()
            .map(|c| c.len_utf16() as u32)
            .sum();
        Position { line, character }
    }

    /// Convert an LSP position to a byte offset. Positions past the end of
    /// a line clamp to the line end.
    pub fn offset_of(&self, position: Position) -> usize {
        let Some(&line_start) = self.line_starts.get(position.line as usize) else {
            return self.text.len();
        };
        let line_end = self
            .line_starts
            .get(position.line as usize + 1)
            .map(|&next| next - 1)
            .unwrap_or(self.text.len());

        let mut remaining = position.character;
        let mut offset = line_start;
        for c in self.text[line_start..line_end].chars() {
            if remaining == 0 {
                break;
            }
            let units = c.len_utf16() as u32;
            if units > remaining {
                break;
            }
            remaining -= units;
            offset += c.len_utf8();
        }
        offset
    }

    /// Convert a byte span to an LSP range.
    pub fn range_of(&self, start: usize, end: usize) -> Range {
        Range {
            start: self.position_of(start),
            end: self.position_of(end),
        }
    }
}
