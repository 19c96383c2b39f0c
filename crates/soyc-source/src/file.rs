use camino::Utf8Path;
use camino::Utf8PathBuf;

use crate::position::LineIndex;
use crate::LineCol;
use crate::Span;

/// A template source file: its path, text and line index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: Utf8PathBuf,
    text: String,
    line_index: LineIndex,
}

impl SourceFile {
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let line_index = LineIndex::from_text(&text);
        Self {
            path: path.into(),
            text,
            line_index,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    #[must_use]
    pub fn line_col(&self, span: Span) -> LineCol {
        self.line_index.line_col(span.start())
    }

    /// The source text covered by `span`, if it lies on char boundaries.
    #[must_use]
    pub fn slice(&self, span: Span) -> Option<&str> {
        let start = span.start_usize();
        self.text.get(start..start + span.length_usize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_and_position() {
        let file = SourceFile::new("templates/list.soy", "<ul>\n  <li>A\n</ul>\n");

        assert_eq!(file.path().as_str(), "templates/list.soy");
        assert_eq!(file.slice(Span::new(7, 4)), Some("<li>"));
        assert_eq!(file.line_col(Span::new(7, 4)), LineCol::new(2, 3));
        assert_eq!(file.slice(Span::new(100, 4)), None);
    }
}
