//! The error channel (spec.md §7): every pass reports failures as
//! [`Diagnostic`] values collected into a [`Diagnostics`] sink rather than
//! panicking or throwing out-of-band. Rendering to a terminal is the
//! collaborator's job (`src/bin/wsc.rs`); this module only knows how to
//! format itself, the way the teacher's `ParseError::fmt` does.
use colored::Colorize;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    UnexpectedCharacter,
    UnexpectedToken,
    UnexpectedEnd,
    UnterminatedString,
    UnterminatedBlock,
    SymbolNotFound,
    SymbolShadowing,
    MismatchedTypes,
    ConstantOverflow,
    LocalOverflow,
}

impl DiagnosticKind {
    /// The numeric code rendered as `[E####]`; the ordinal of the kind.
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// A byte range in the original source, resolved lazily to line/column
/// only when a diagnostic is actually rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, span: Option<SourceSpan>) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    /// Render against the original source, reproducing the previous line,
    /// the offending line, and a caret underline — the layout the teacher's
    /// `ParseError::fmt` already uses for parse errors, reused here for
    /// every diagnostic kind.
    pub fn render(&self, source: &str) -> String {
        let header = format!("[E{:04}]: {}", self.kind.code(), self.message);

        let Some(span) = self.span else {
            return header;
        };

        let (line_number, column) = line_col(source, span.start);
        let lines: Vec<&str> = source.lines().collect();
        let Some(line_text) = lines.get(line_number.saturating_sub(1)) else {
            return header;
        };

        let caret_len = (span.end.saturating_sub(span.start)).max(1);
        let margin = " ".repeat(format!("{line_number}").len());
        let padding = " ".repeat(column.saturating_sub(1));
        let carets = "^".repeat(caret_len).red();

        format!(
            "{header}\n{margin} |\n{line_number} |{line_text}\n{margin} |{padding}{carets}"
        )
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("[E{:04}]: {}", self.kind.code(), self.message))
    }
}

impl std::error::Error for Diagnostic {}

/// Compute 1-indexed (line, column) for a byte offset into `source`.
fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, b) in source.bytes().enumerate() {
        if i == offset {
            break;
        }
        if b == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Collects diagnostics queued by a pass. The first error in a pass aborts
/// that pass's traversal, but everything queued so far is still delivered
/// to the caller, per spec.md §7.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&Diagnostic> {
        self.items.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_header_without_span() {
        let d = Diagnostic::new(DiagnosticKind::SymbolNotFound, "'x' not found", None);
        assert_eq!(d.render("ignored"), "[E0005]: 'x' not found");
    }

    #[test]
    fn line_col_tracks_newlines() {
        let source = "ab\ncd";
        assert_eq!(line_col(source, 0), (1, 1));
        assert_eq!(line_col(source, 3), (2, 1));
        assert_eq!(line_col(source, 4), (2, 2));
    }
}
