use annotate_snippets::AnnotationKind;
use annotate_snippets::Level;
use annotate_snippets::Renderer;
use annotate_snippets::Snippet;

use crate::SourceFile;
use crate::Span;

/// How loudly a diagnostic is shown. There is no "off": a diagnostic that is
/// switched off is never built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Label {
    span: Span,
    text: String,
    primary: bool,
}

/// A problem in a template, detached from the error type that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    code: &'static str,
    message: String,
    severity: Severity,
    labels: Vec<Label>,
    notes: Vec<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            code,
            message: message.into(),
            severity,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Underline `span` with `^^^` as the place the problem is.
    #[must_use]
    pub fn primary(self, span: Span, text: impl Into<String>) -> Self {
        self.label(span, text.into(), true)
    }

    /// Underline `span` with `---` as related context.
    #[must_use]
    pub fn secondary(self, span: Span, text: impl Into<String>) -> Self {
        self.label(span, text.into(), false)
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    fn label(mut self, span: Span, text: String, primary: bool) -> Self {
        self.labels.push(Label {
            span,
            text,
            primary,
        });
        self
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }
}

/// Formats diagnostics against their source file with `annotate-snippets`.
///
/// Plain output carries no ANSI escapes and is what tests compare against;
/// styled output is for terminals.
#[derive(Debug)]
pub struct DiagnosticRenderer {
    renderer: Renderer,
}

impl DiagnosticRenderer {
    #[must_use]
    pub fn plain() -> Self {
        Self {
            renderer: Renderer::plain(),
        }
    }

    #[must_use]
    pub fn styled() -> Self {
        Self {
            renderer: Renderer::styled(),
        }
    }

    #[must_use]
    pub fn render(&self, file: &SourceFile, diagnostic: &Diagnostic) -> String {
        let source = file.text();
        let mut snippet = Snippet::source(source)
            .path(file.path().as_str())
            .line_start(1);

        // Synthetic tags sit at zero-width spans, possibly at end of input.
        for label in &diagnostic.labels {
            let start = label.span.start_usize().min(source.len());
            let end = (start + label.span.length_usize()).min(source.len());
            let kind = if label.primary {
                AnnotationKind::Primary
            } else {
                AnnotationKind::Context
            };
            snippet = snippet.annotation(kind.span(start..end).label(label.text.as_str()));
        }

        let level = match diagnostic.severity {
            Severity::Error => Level::ERROR,
            Severity::Warning => Level::WARNING,
            Severity::Info => Level::INFO,
            Severity::Hint => Level::HELP,
        };
        let mut group = level
            .primary_title(diagnostic.message.as_str())
            .id(diagnostic.code)
            .element(snippet);
        for note in &diagnostic.notes {
            group = group.element(Level::NOTE.message(note.as_str()));
        }

        self.renderer.render(&[group])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> SourceFile {
        SourceFile::new("templates/list.soy", "<ul>\n  <li>A\n</div>\n")
    }

    #[test]
    fn renders_code_message_and_labels() {
        let diagnostic = Diagnostic::new(
            "H103",
            "Unexpected HTML close tag. Expected to match the '<li>' at 2:3.",
            Severity::Error,
        )
        .primary(Span::new(13, 6), "unexpected close tag")
        .secondary(Span::new(7, 4), "expected to match this");

        let output = DiagnosticRenderer::plain().render(&list(), &diagnostic);

        assert!(output.contains("error[H103]"));
        assert!(output.contains("Expected to match the '<li>' at 2:3."));
        assert!(output.contains("templates/list.soy"));
        assert!(output.contains("</div>"));
        assert!(output.contains("unexpected close tag"));
        assert!(output.contains("expected to match this"));
        assert!(output.contains("^^^"));
    }

    #[test]
    fn severity_picks_the_header() {
        let diagnostic = Diagnostic::new("H105", "inconsistent", Severity::Warning)
            .primary(Span::new(7, 4), "");
        let output = DiagnosticRenderer::plain().render(&list(), &diagnostic);

        assert!(output.contains("warning[H105]"));
        assert_eq!(diagnostic.severity(), Severity::Warning);
        assert_eq!(diagnostic.code(), "H105");
    }

    #[test]
    fn notes_follow_the_snippet() {
        let diagnostic = Diagnostic::new("H104", "never matched", Severity::Error)
            .primary(Span::new(0, 4), "never closed")
            .note("tags within a msg must be internally balanced");
        let output = DiagnosticRenderer::plain().render(&list(), &diagnostic);

        assert!(output.contains("note: tags within a msg"));
    }

    #[test]
    fn spans_past_the_end_are_clamped() {
        let file = SourceFile::new("t.soy", "<p>");
        let diagnostic =
            Diagnostic::new("H104", "never matched", Severity::Error).primary(Span::new(2, 40), "");

        assert!(DiagnosticRenderer::plain()
            .render(&file, &diagnostic)
            .contains("error[H104]"));
    }

    #[test]
    fn only_styled_output_has_escapes() {
        let diagnostic =
            Diagnostic::new("H104", "never matched", Severity::Error).primary(Span::new(0, 4), "");

        assert!(!DiagnosticRenderer::plain()
            .render(&list(), &diagnostic)
            .contains("\x1b["));
        assert!(DiagnosticRenderer::styled()
            .render(&list(), &diagnostic)
            .contains("\x1b["));
    }
}
