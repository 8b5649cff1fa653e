use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveErrorKind {
    SymbolNotFound { name: String },
    SymbolShadowing { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    pub kind: ResolveErrorKind,
    pub span: SourceSpan,
}

impl ResolveError {
    pub fn not_found(name: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind: ResolveErrorKind::SymbolNotFound { name: name.into() },
            span: SourceSpan { start, end },
        }
    }

    pub fn shadowing(name: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind: ResolveErrorKind::SymbolShadowing { name: name.into() },
            span: SourceSpan { start, end },
        }
    }
}

impl From<ResolveError> for Diagnostic {
    fn from(err: ResolveError) -> Self {
        let (kind, message) = match err.kind {
            ResolveErrorKind::SymbolNotFound { name } => {
                (DiagnosticKind::SymbolNotFound, format!("'{name}' is not defined"))
            }
            ResolveErrorKind::SymbolShadowing { name } => (
                DiagnosticKind::SymbolShadowing,
                format!("'{name}' is already defined in this scope"),
            ),
        };
        Diagnostic::new(kind, message, Some(err.span))
    }
}
