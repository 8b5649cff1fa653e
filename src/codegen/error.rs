use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodegenErrorKind {
    ConstantOverflow,
    LocalOverflow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenError {
    pub kind: CodegenErrorKind,
    pub span: SourceSpan,
}

impl CodegenError {
    pub fn constant_overflow(start: usize, end: usize) -> Self {
        Self {
            kind: CodegenErrorKind::ConstantOverflow,
            span: SourceSpan { start, end },
        }
    }

    pub fn local_overflow(start: usize, end: usize) -> Self {
        Self {
            kind: CodegenErrorKind::LocalOverflow,
            span: SourceSpan { start, end },
        }
    }
}

impl From<CodegenError> for Diagnostic {
    fn from(err: CodegenError) -> Self {
        let (kind, message) = match err.kind {
            CodegenErrorKind::ConstantOverflow => {
                (DiagnosticKind::ConstantOverflow, "constant pool exceeded 255 entries".to_string())
            }
            CodegenErrorKind::LocalOverflow => {
                (DiagnosticKind::LocalOverflow, "function exceeded 255 local slots".to_string())
            }
        };
        Diagnostic::new(kind, message, Some(err.span))
    }
}
