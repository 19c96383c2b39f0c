use std::fmt;

use serde::Serialize;
use soyc_source::LineCol;
use soyc_source::Span;
use thiserror::Error;

/// Names the nested construct a diagnostic was produced in, if any.
///
/// Renders as a trailing sentence on every message produced while matching
/// the inside of a `msg`, `let`, `param`, `velog` or `for` body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct BlockQualifier(Option<&'static str>);

impl BlockQualifier {
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn block(label: &'static str) -> Self {
        Self(Some(label))
    }

    #[must_use]
    pub fn label(self) -> Option<&'static str> {
        self.0
    }
}

impl fmt::Display for BlockQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(label) => write!(f, " Tags within a {label} must be internally balanced."),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
pub enum HtmlTagError {
    #[error("'{tag}' tag is not allowed to be self-closing.{block}")]
    InvalidSelfClosingTag {
        tag: String,
        span: Span,
        block: BlockQualifier,
    },

    #[error("'{tag}' tag is a void element and must not specify a close tag.{block}")]
    VoidCloseTag {
        tag: String,
        span: Span,
        block: BlockQualifier,
    },

    #[error("Unexpected HTML close tag.{block}")]
    UnexpectedCloseTag { span: Span, block: BlockQualifier },

    #[error("Unexpected HTML close tag. Expected to match the '<{open}>' at {open_position}.{block}")]
    MismatchedCloseTag {
        open: String,
        open_position: LineCol,
        open_span: Span,
        span: Span,
        block: BlockQualifier,
    },

    #[error("This HTML open tag is never matched with a close tag.{block}")]
    UnmatchedOpenTag {
        tag: String,
        span: Span,
        block: BlockQualifier,
    },

    #[error("This HTML open tag does not consistently match with a close tag.{block}")]
    InconsistentOpenTag {
        tag: String,
        span: Span,
        block: BlockQualifier,
    },

    #[error("Expected an html tag name.{block}")]
    ExpectedTagName { span: Span, block: BlockQualifier },

    /// Points at the template or block whose paths were cut short.
    #[error("Too many distinct control flow paths; HTML tags were only matched on some of them.{block}")]
    TooManyPaths { span: Span, block: BlockQualifier },
}

impl HtmlTagError {
    /// The tag this diagnostic points at.
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            HtmlTagError::InvalidSelfClosingTag { span, .. }
            | HtmlTagError::VoidCloseTag { span, .. }
            | HtmlTagError::UnexpectedCloseTag { span, .. }
            | HtmlTagError::MismatchedCloseTag { span, .. }
            | HtmlTagError::UnmatchedOpenTag { span, .. }
            | HtmlTagError::InconsistentOpenTag { span, .. }
            | HtmlTagError::ExpectedTagName { span, .. }
            | HtmlTagError::TooManyPaths { span, .. } => *span,
        }
    }

    /// Get a diagnostic code string for this error type
    #[must_use]
    pub fn diagnostic_code(&self) -> &'static str {
        match self {
            HtmlTagError::InvalidSelfClosingTag { .. } => "H100",
            HtmlTagError::VoidCloseTag { .. } => "H101",
            HtmlTagError::UnexpectedCloseTag { .. } => "H102",
            HtmlTagError::MismatchedCloseTag { .. } => "H103",
            HtmlTagError::UnmatchedOpenTag { .. } => "H104",
            HtmlTagError::InconsistentOpenTag { .. } => "H105",
            HtmlTagError::ExpectedTagName { .. } => "H106",
            HtmlTagError::TooManyPaths { .. } => "H107",
        }
    }

    #[must_use]
    pub fn block(&self) -> BlockQualifier {
        match self {
            HtmlTagError::InvalidSelfClosingTag { block, .. }
            | HtmlTagError::VoidCloseTag { block, .. }
            | HtmlTagError::UnexpectedCloseTag { block, .. }
            | HtmlTagError::MismatchedCloseTag { block, .. }
            | HtmlTagError::UnmatchedOpenTag { block, .. }
            | HtmlTagError::InconsistentOpenTag { block, .. }
            | HtmlTagError::ExpectedTagName { block, .. }
            | HtmlTagError::TooManyPaths { block, .. } => *block,
        }
    }
}
