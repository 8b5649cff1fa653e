use std::fmt::Display;

/// A runtime fault (spec.md §4.7). Distinct from [`crate::diagnostics::Diagnostic`]:
/// diagnostics are compile-time; the VM aborts execution on the first one
/// of these instead, with no recovery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    MalformedInstruction { pc: usize },
    InvalidConstant { index: u8 },
    InvalidCallFrame,
    StackOverflow,
    StackUnderflow,
    /// Surfaced for interface parity with spec.md §7's "allocation failure
    /// is a distinct error kind" — never constructed in practice, since
    /// Rust's global allocator aborts the process on real exhaustion rather
    /// than returning a catchable error here.
    AllocationFailure,
    DivisionByZero,
    IndexOutOfBounds { index: i64, len: usize },
    OutputFailure,
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::MalformedInstruction { pc } => write!(f, "malformed instruction at pc={pc}"),
            RuntimeError::InvalidConstant { index } => write!(f, "invalid constant index {index}"),
            RuntimeError::InvalidCallFrame => f.write_str("invalid call frame"),
            RuntimeError::StackOverflow => f.write_str("evaluation stack overflow"),
            RuntimeError::StackUnderflow => f.write_str("evaluation stack underflow"),
            RuntimeError::AllocationFailure => f.write_str("heap allocation failure"),
            RuntimeError::DivisionByZero => f.write_str("division by zero"),
            RuntimeError::IndexOutOfBounds { index, len } => {
                write!(f, "array index {index} out of bounds for length {len}")
            }
            RuntimeError::OutputFailure => f.write_str("failed to write builtin output"),
        }
    }
}

impl std::error::Error for RuntimeError {}
