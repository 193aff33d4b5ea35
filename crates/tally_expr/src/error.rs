//! # Evaluator Error Types
//!
//! Everything that can stop an expression from producing a number.

use thiserror::Error;

/// Errors raised by the arithmetic kernel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// The expression is not well formed, or an operator was applied outside its domain.
    #[error("invalid expression: {0}")]
    Invalid(String),

    /// Division, floor division, modulo or a negative power with a zero divisor.
    #[error("division by zero")]
    DivideByZero,

    /// A result's magnitude exceeded the precision ceiling.
    #[error("result too large")]
    Overflow,

    /// A non-zero result fell below the smallest representable magnitude.
    #[error("result too small")]
    Underflow,

    /// The final result needs more digits than the working precision allows.
    #[error("result needs more precision than configured")]
    PrecisionError,

    /// An intermediate would need an unreasonable amount of memory.
    #[error("intermediate result exceeds memory limits")]
    Memory,

    /// The evaluation budget was cancelled (deadline reached).
    #[error("evaluation cancelled")]
    Cancelled,
}

impl KernelError {
    /// Shorthand for [`KernelError::Invalid`].
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Errors raised while setting up a sandboxed evaluation.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The worker thread could not be started.
    #[error("failed to spawn evaluation worker: {0}")]
    Spawn(#[from] std::io::Error),
}
