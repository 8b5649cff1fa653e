use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};
use crate::typecheck::types::Type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub message: String,
    pub span: SourceSpan,
}

impl TypeError {
    pub fn new(message: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            message: message.into(),
            span: SourceSpan { start, end },
        }
    }

    pub fn mismatch(expected: &Type, found: &Type, start: usize, end: usize) -> Self {
        Self::new(format!("expected type '{expected}', found '{found}'"), start, end)
    }

    pub fn unknown_type(name: &str, start: usize, end: usize) -> Self {
        Self::new(format!("unknown type '{name}'"), start, end)
    }

    pub fn void_variable(start: usize, end: usize) -> Self {
        Self::new("variables cannot have type 'void'", start, end)
    }
}

impl From<TypeError> for Diagnostic {
    fn from(err: TypeError) -> Self {
        Diagnostic::new(DiagnosticKind::MismatchedTypes, err.message, Some(err.span))
    }
}
