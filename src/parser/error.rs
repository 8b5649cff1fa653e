use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};
use crate::lexer::TokenKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedToken { expected: String, found: TokenKind },
    UnexpectedEnd { expected: String },
    UnterminatedBlock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Option<SourceSpan>,
}

impl ParseError {
    pub fn unexpected_token(expected: impl Into<String>, found: TokenKind, start: usize, end: usize) -> Self {
        Self {
            kind: ParseErrorKind::UnexpectedToken {
                expected: expected.into(),
                found,
            },
            span: Some(SourceSpan { start, end }),
        }
    }

    pub fn unexpected_end(expected: impl Into<String>) -> Self {
        Self {
            kind: ParseErrorKind::UnexpectedEnd {
                expected: expected.into(),
            },
            span: None,
        }
    }

    pub fn unterminated_block(start: usize, end: usize) -> Self {
        Self {
            kind: ParseErrorKind::UnterminatedBlock,
            span: Some(SourceSpan { start, end }),
        }
    }
}

impl From<ParseError> for Diagnostic {
    fn from(err: ParseError) -> Self {
        let (kind, message) = match err.kind {
            ParseErrorKind::UnexpectedToken { expected, found } => (
                DiagnosticKind::UnexpectedToken,
                format!("expected {expected}, found {found}"),
            ),
            ParseErrorKind::UnexpectedEnd { expected } => (
                DiagnosticKind::UnexpectedEnd,
                format!("hit end of input while parsing {expected}"),
            ),
            ParseErrorKind::UnterminatedBlock => (
                DiagnosticKind::UnterminatedBlock,
                "unterminated block".to_string(),
            ),
        };
        Diagnostic::new(kind, message, err.span)
    }
}
