//! # Tally Expression Evaluator
//!
//! Turns a chat message into a number, or a reason it is not one.
//!
//! ## Pipeline
//!
//! ```text
//! raw message ─► filter ─► rewrite_bases ─► rewrite_ops ─► Sandbox ─► TaggedResult
//!                  │                                          │
//!                  └─ rejected: not a count attempt           └─ worker thread + deadline
//! ```
//!
//! ## Design Principles
//!
//! 1. **Exact arithmetic** - [`ExactDecimal`] never touches binary floating point
//! 2. **Closed language** - literals and a fixed operator set, nothing to look up
//! 3. **Fail closed** - anything unexpected becomes [`TaggedResult::Invalid`]
//! 4. **Bounded latency** - the caller waits at most the configured deadline
//!
//! ## Example
//!
//! ```rust,ignore
//! use tally_expr::{prepare, Sandbox, TaggedResult};
//!
//! let sandbox = Sandbox::default();
//! let expr = prepare("0x2 # 3")?;          // "2**3"
//! assert!(matches!(sandbox.run(&expr), TaggedResult::Success(_)));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod budget;
pub mod decimal;
pub mod error;
pub mod filter;
pub mod kernel;
pub mod rewrite;
pub mod sandbox;

pub use budget::Budget;
pub use decimal::{DecimalContext, ExactDecimal};
pub use error::{KernelError, KernelResult, SandboxError};
pub use filter::{filter, normalize, FilterRejection, MAX_MESSAGE_CHARS};
pub use kernel::{evaluate, EvaluatorSettings};
pub use rewrite::{rewrite, rewrite_bases, rewrite_ops};
pub use sandbox::{Sandbox, SandboxConfig, SandboxStats, TaggedResult};

/// Filter then rewrite: raw chat text to kernel syntax.
///
/// # Errors
///
/// The [`FilterRejection`] when the message is not a count attempt.
pub fn prepare(raw: &str) -> Result<String, FilterRejection> {
    let filtered = filter(raw)?;
    Ok(rewrite(&filtered))
}

/// Whole pipeline on the blocking sandbox entry point.
///
/// A message the filter rejects is [`TaggedResult::Invalid`].
#[must_use]
pub fn evaluate_message(raw: &str, sandbox: &Sandbox) -> TaggedResult {
    match prepare(raw) {
        Ok(expr) => sandbox.run(&expr),
        Err(rejection) => {
            tracing::trace!(%rejection, "not a count attempt");
            TaggedResult::Invalid
        }
    }
}

/// Whole pipeline on the async sandbox entry point.
pub async fn evaluate_message_async(raw: &str, sandbox: &Sandbox) -> TaggedResult {
    match prepare(raw) {
        Ok(expr) => sandbox.run_async(&expr).await,
        Err(rejection) => {
            tracing::trace!(%rejection, "not a count attempt");
            TaggedResult::Invalid
        }
    }
}
