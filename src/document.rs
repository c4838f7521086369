//! Text document snapshot with UTF-16 position mapping

use tower_lsp::lsp_types::{Position, Range, TextDocumentContentChangeEvent, Url};

/// Immutable snapshot of an open document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    uri: Url,
    language_id: String,
    version: i32,
    text: String,
    /// Byte offset of the first character of every line
    line_offsets: Vec<usize>,
}

impl TextDocument {
    pub fn new(uri: Url, language_id: impl Into<String>, version: i32, text: impl Into<String>) -> Self {
        let text = text.into();
        let line_offsets = compute_line_offsets(&text);
        Self {
            uri,
            language_id: language_id.into(),
            version,
            text,
            line_offsets,
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_offsets.len()
    }

    /// Converts an LSP position (UTF-16 columns) into a byte offset.
    /// Positions past the end of a line or the document are clamped.
    pub fn offset_at(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.line_offsets.len() {
            return self.text.len();
        }

        let line_start = self.line_offsets[line];
        let line_end = self
            .line_offsets
            .get(line + 1)
            .copied()
            .unwrap_or(self.text.len());
        let line_text = &self.text[line_start..line_end];

        let mut utf16_column = 0u32;
        for (byte_index, ch) in line_text.char_indices() {
            if utf16_column >= position.character || ch == '\n' || ch == '\r' {
                return line_start + byte_index;
            }
            utf16_column += ch.len_utf16() as u32;
        }
        line_end
    }

    /// Converts a byte offset into an LSP position (UTF-16 columns).
    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = match self.line_offsets.binary_search(&offset) {
            Ok(line) => line,
            Err(next_line) => next_line - 1,
        };
        let line_start = self.line_offsets[line];
        let character: usize = self.text[line_start..offset]
            .chars()
            .map(char::len_utf16)
            .sum();

        Position::new(line as u32, character as u32)
    }

    pub fn range_of(&self, start: usize, end: usize) -> Range {
        Range::new(self.position_at(start), self.position_at(end))
    }

    /// Returns a new snapshot with the change events applied in order.
    pub fn apply_changes(&self, version: i32, changes: &[TextDocumentContentChangeEvent]) -> Self {
        let mut document = self.clone();
        for change in changes {
            match change.range {
                Some(range) => {
                    let start = document.offset_at(range.start);
                    let end = document.offset_at(range.end).max(start);
                    document.text.replace_range(start..end, &change.text);
                }
                None => document.text = change.text.clone(),
            }
            document.line_offsets = compute_line_offsets(&document.text);
        }
        document.version = version;
        document
    }
}

fn compute_line_offsets(text: &str) -> Vec<usize> {
    let mut offsets = vec![0];
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                offsets.push(i + 1);
            }
            b'\n' => offsets.push(i + 1),
            _ => {}
        }
        i += 1;
    }
    offsets
}
