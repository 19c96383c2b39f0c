use soyc_conf::DiagnosticSeverity;
use soyc_conf::DiagnosticsConfig;
use soyc_source::Diagnostic;
use soyc_source::DiagnosticRenderer;
use soyc_source::SourceFile;

use crate::errors::HtmlTagError;

/// Receives the diagnostics of a tag-matching run.
///
/// The matcher never decides whether a diagnostic is fatal; whoever owns
/// the sink does.
pub trait DiagnosticSink {
    fn report(&mut self, error: HtmlTagError);
}

impl DiagnosticSink for Vec<HtmlTagError> {
    fn report(&mut self, error: HtmlTagError) {
        self.push(error);
    }
}

fn label(error: &HtmlTagError) -> &'static str {
    match error {
        HtmlTagError::InvalidSelfClosingTag { .. } => "self-closing",
        HtmlTagError::VoidCloseTag { .. } => "close tag of a void element",
        HtmlTagError::UnexpectedCloseTag { .. } | HtmlTagError::MismatchedCloseTag { .. } => {
            "unexpected close tag"
        }
        HtmlTagError::UnmatchedOpenTag { .. } => "never closed",
        HtmlTagError::InconsistentOpenTag { .. } => "closed on some paths only",
        HtmlTagError::ExpectedTagName { .. } => "dynamic close for a static open tag",
        HtmlTagError::TooManyPaths { .. } => "checked on some paths only",
    }
}

/// Convert `error` for display, or `None` when its code is configured `off`.
#[must_use]
pub fn to_diagnostic(error: &HtmlTagError, config: &DiagnosticsConfig) -> Option<Diagnostic> {
    let code = error.diagnostic_code();
    let severity = config.get_severity(code);
    if severity == DiagnosticSeverity::Off {
        return None;
    }

    let mut diagnostic = Diagnostic::new(code, error.to_string(), severity.to_render_severity()?)
        .primary(error.span(), label(error));
    if let HtmlTagError::MismatchedCloseTag { open_span, .. } = error {
        diagnostic = diagnostic.secondary(*open_span, "expected to match this");
    }
    Some(diagnostic)
}

/// Render one diagnostic, or nothing when its code is configured `off`.
#[must_use]
pub fn render_html_error(
    file: &SourceFile,
    error: &HtmlTagError,
    config: &DiagnosticsConfig,
    fmt: &DiagnosticRenderer,
) -> Option<String> {
    to_diagnostic(error, config).map(|diagnostic| fmt.render(file, &diagnostic))
}

/// Render every enabled diagnostic, in the order given.
#[must_use]
pub fn render_diagnostics(
    file: &SourceFile,
    errors: &[HtmlTagError],
    config: &DiagnosticsConfig,
    fmt: &DiagnosticRenderer,
) -> Vec<String> {
    errors
        .iter()
        .filter_map(|error| render_html_error(file, error, config, fmt))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use soyc_source::LineCol;
    use soyc_source::Severity;
    use soyc_source::Span;

    use super::*;
    use crate::errors::BlockQualifier;

    fn mismatched() -> HtmlTagError {
        HtmlTagError::MismatchedCloseTag {
            open: "div".to_string(),
            open_position: LineCol::new(1, 1),
            open_span: Span::new(0, 5),
            span: Span::new(9, 7),
            block: BlockQualifier::none(),
        }
    }

    #[test]
    fn vec_is_a_sink() {
        let mut sink = Vec::new();
        sink.report(HtmlTagError::UnexpectedCloseTag {
            span: Span::new(0, 6),
            block: BlockQualifier::none(),
        });
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn renders_both_tags_of_a_mismatch() {
        let output = render_html_error(
            &SourceFile::new("t.soy", "<div>\n<p>\n</span>\n"),
            &mismatched(),
            &DiagnosticsConfig::default(),
            &DiagnosticRenderer::plain(),
        )
        .unwrap();

        assert!(output.contains("error[H103]"));
        assert!(output.contains("Expected to match the '<div>' at 1:1."));
        assert!(output.contains("expected to match this"));
        assert!(output.contains("unexpected close tag"));
    }

    #[test]
    fn configured_severity_applies() {
        let mut severity = HashMap::new();
        severity.insert("H10".to_string(), DiagnosticSeverity::Warning);
        severity.insert("h102".to_string(), DiagnosticSeverity::Off);
        let config = DiagnosticsConfig { severity };

        let errors = vec![
            mismatched(),
            HtmlTagError::UnexpectedCloseTag {
                span: Span::new(9, 7),
                block: BlockQualifier::none(),
            },
        ];
        let rendered = render_diagnostics(
            &SourceFile::new("t.soy", "<div>\n<p>\n</span>\n"),
            &errors,
            &config,
            &DiagnosticRenderer::plain(),
        );

        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].contains("warning[H103]"));
    }

    #[test]
    fn off_codes_build_nothing() {
        let mut severity = HashMap::new();
        severity.insert("H1".to_string(), DiagnosticSeverity::Off);
        let config = DiagnosticsConfig { severity };

        assert!(to_diagnostic(&mismatched(), &config).is_none());
        let diagnostic = to_diagnostic(&mismatched(), &DiagnosticsConfig::default()).unwrap();
        assert_eq!(diagnostic.code(), "H103");
        assert_eq!(diagnostic.severity(), Severity::Error);
    }
}
