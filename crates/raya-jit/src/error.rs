//! The two error channels spec.md §7 describes: compile-time status codes
//! and the closed set of in-band runtime error codes emitted code raises.

use thiserror::Error;

/// Compile-time failure. This is the status `compile()` and
/// `compile_from_thunk()` return (§6, §7); it never escapes into emitted
/// code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("out of memory publishing compiled code")]
    OutOfMemory,
    #[error("invalid p-code address")]
    InvalidAddress,
    #[error("compile aborted: preemption pending")]
    Timeout,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("assembler backend error: {0}")]
    Backend(String),
    #[error("assembler buffer overflow")]
    AssemblerOverflow,
}

impl From<crate::assembler::AssemblerError> for CompileError {
    fn from(_: crate::assembler::AssemblerError) -> Self {
        CompileError::AssemblerOverflow
    }
}

impl From<crate::runtime::code_chunk::LinkError> for CompileError {
    fn from(_: crate::runtime::code_chunk::LinkError) -> Self {
        CompileError::OutOfMemory
    }
}

/// The closed set of in-band runtime error codes (§6 "Error codes").
/// Emitted code never returns these as Rust values — it jumps to the shared
/// handler for the matching variant, which tail-calls
/// `Environment::report_error` with the code below.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeErrorCode {
    DivideByZero = 0,
    StackLow = 1,
    StackMin = 2,
    ArrayBounds = 3,
    MemoryAccess = 4,
    HeapLow = 5,
    HeapMin = 6,
    IntegerOverflow = 7,
    InvalidNative = 8,
}

impl RuntimeErrorCode {
    /// All variants, in the fixed order spec.md §4.1 step 6 lists them.
    /// The error-path table is indexed by this order.
    pub const ALL: [RuntimeErrorCode; 9] = [
        RuntimeErrorCode::DivideByZero,
        RuntimeErrorCode::StackLow,
        RuntimeErrorCode::StackMin,
        RuntimeErrorCode::ArrayBounds,
        RuntimeErrorCode::MemoryAccess,
        RuntimeErrorCode::HeapLow,
        RuntimeErrorCode::HeapMin,
        RuntimeErrorCode::IntegerOverflow,
        RuntimeErrorCode::InvalidNative,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_covers_every_variant_once() {
        assert_eq!(RuntimeErrorCode::ALL.len(), 9);
        for (i, code) in RuntimeErrorCode::ALL.iter().enumerate() {
            assert_eq!(code.index(), i);
        }
    }
}
