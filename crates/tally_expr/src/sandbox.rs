//! # Evaluation Sandbox
//!
//! Runs one kernel evaluation on a dedicated worker thread and hands back a
//! [`TaggedResult`] within a fixed deadline, no matter what the expression
//! does.
//!
//! ```text
//! ┌──────────────┐  expr   ┌──────────────┐
//! │    caller    │ ──────▶ │    worker    │  big stack, own Budget
//! │ (sync/async) │ ◀────── │   (thread)   │
//! └──────────────┘ result  └──────────────┘
//!        │ deadline passes
//!        ▼
//!   Budget::cancel() ──▶ Timeout; the worker unwinds at its next poll
//! ```
//!
//! ## Guarantees
//!
//! - The caller is never blocked longer than the deadline.
//! - A worker that panics, or vanishes without answering, reads as
//!   [`TaggedResult::Invalid`].
//! - Nothing outside the worker is mutated by the evaluation.
//!
//! ## Cancellation is cooperative
//!
//! Threads cannot be killed from outside. After a timeout the worker is
//! detached and stops at its next [`Budget::check`]; a single huge
//! multiplication in flight runs to completion first. A warning is logged
//! once when the first sandbox is built.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};

use crate::budget::Budget;
use crate::decimal::ExactDecimal;
use crate::error::{KernelError, SandboxError};
use crate::kernel::{self, EvaluatorSettings};

/// Default wall-clock deadline per evaluation.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(2);

/// Default worker stack size (16 MiB).
pub const DEFAULT_STACK_BYTES: usize = 16 * 1024 * 1024;

/// Outcome of one sandboxed evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggedResult {
    /// The expression produced a number.
    Success(ExactDecimal),
    /// Not a well-formed expression, or an operator outside its domain.
    Invalid,
    /// The deadline passed.
    Timeout,
    /// Division by zero somewhere in the expression.
    DivideByZero,
    /// A magnitude outside the representable range.
    Overflow,
    /// The result needs more precision than configured.
    PrecisionError,
}

impl TaggedResult {
    /// The number, for [`TaggedResult::Success`].
    #[must_use]
    pub fn value(&self) -> Option<&ExactDecimal> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Short lowercase tag, for logs.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Invalid => "invalid",
            Self::Timeout => "timeout",
            Self::DivideByZero => "divide_by_zero",
            Self::Overflow => "overflow",
            Self::PrecisionError => "precision_error",
        }
    }
}

impl From<KernelError> for TaggedResult {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::Invalid(_) => Self::Invalid,
            KernelError::DivideByZero => Self::DivideByZero,
            // Too small to represent is reported as out of range too.
            KernelError::Overflow | KernelError::Underflow | KernelError::Memory => {
                Self::Overflow
            }
            KernelError::PrecisionError => Self::PrecisionError,
            KernelError::Cancelled => Self::Timeout,
        }
    }
}

/// Sandbox configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Wall-clock deadline per evaluation.
    pub deadline: Duration,
    /// Worker thread stack size in bytes.
    pub stack_bytes: usize,
    /// Numeric settings handed to the kernel.
    pub evaluator: EvaluatorSettings,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            stack_bytes: DEFAULT_STACK_BYTES,
            evaluator: EvaluatorSettings::default(),
        }
    }
}

/// Counters, readable while evaluations are running.
#[derive(Debug, Default)]
pub struct SandboxStats {
    /// Evaluations started.
    pub evaluations: AtomicU64,
    /// Evaluations that hit the deadline.
    pub timeouts: AtomicU64,
    /// Workers that panicked or never answered.
    pub worker_failures: AtomicU64,
}

static COOPERATIVE_NOTICE: Once = Once::new();

/// Runs untrusted expressions under a deadline.
#[derive(Debug)]
pub struct Sandbox {
    config: SandboxConfig,
    next_worker: AtomicU64,
    stats: Arc<SandboxStats>,
}

impl Sandbox {
    /// Creates a sandbox.
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        COOPERATIVE_NOTICE.call_once(|| {
            tracing::warn!(
                "evaluation workers stop cooperatively; a timed-out worker may keep a core busy until its next budget check"
            );
        });
        tracing::debug!(
            deadline_ms = config.deadline.as_millis() as u64,
            stack_bytes = config.stack_bytes,
            precision = config.evaluator.precision,
            "sandbox ready"
        );
        Self {
            config,
            next_worker: AtomicU64::new(0),
            stats: Arc::new(SandboxStats::default()),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Shared counters.
    #[must_use]
    pub fn stats(&self) -> Arc<SandboxStats> {
        Arc::clone(&self.stats)
    }

    /// Evaluates `expr` (kernel syntax), blocking the calling thread for at
    /// most the deadline.
    #[must_use]
    pub fn run(&self, expr: &str) -> TaggedResult {
        let budget = Budget::with_timeout(self.config.deadline);
        let (tx, rx) = bounded(1);
        if let Err(err) = self.spawn_worker(expr, &budget, move |result| {
            // The caller may have given up already.
            let _ = tx.send(result);
        }) {
            tracing::warn!("{err}");
            return TaggedResult::Invalid;
        }

        match rx.recv_timeout(self.config.deadline) {
            Ok(result) => self.observe(result),
            Err(RecvTimeoutError::Timeout) => self.expire(&budget),
            Err(RecvTimeoutError::Disconnected) => self.lost_worker(),
        }
    }

    /// Evaluates `expr` (kernel syntax) without blocking the runtime.
    pub async fn run_async(&self, expr: &str) -> TaggedResult {
        let budget = Budget::with_timeout(self.config.deadline);
        let (tx, rx) = tokio::sync::oneshot::channel();
        if let Err(err) = self.spawn_worker(expr, &budget, move |result| {
            let _ = tx.send(result);
        }) {
            tracing::warn!("{err}");
            return TaggedResult::Invalid;
        }

        match tokio::time::timeout(self.config.deadline, rx).await {
            Ok(Ok(result)) => self.observe(result),
            Ok(Err(_)) => self.lost_worker(),
            Err(_) => self.expire(&budget),
        }
    }

    fn spawn_worker<F>(&self, expr: &str, budget: &Budget, deliver: F) -> Result<(), SandboxError>
    where
        F: FnOnce(TaggedResult) + Send + 'static,
    {
        let id = self.next_worker.fetch_add(1, Ordering::Relaxed);
        self.stats.evaluations.fetch_add(1, Ordering::Relaxed);

        let expr = expr.to_owned();
        let budget = budget.clone();
        let settings = self.config.evaluator;

        thread::Builder::new()
            .name(format!("tally-eval-{id}"))
            .stack_size(self.config.stack_bytes)
            .spawn(move || {
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| kernel::evaluate(&expr, &settings, &budget)));
                let result = match outcome {
                    Ok(Ok(value)) => TaggedResult::Success(value),
                    Ok(Err(err)) => {
                        tracing::trace!(worker = id, %err, "evaluation failed");
                        TaggedResult::from(err)
                    }
                    Err(_) => {
                        tracing::error!(worker = id, "evaluation worker panicked");
                        TaggedResult::Invalid
                    }
                };
                deliver(result);
            })?;
        Ok(())
    }

    fn observe(&self, result: TaggedResult) -> TaggedResult {
        if result == TaggedResult::Timeout {
            self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn expire(&self, budget: &Budget) -> TaggedResult {
        budget.cancel();
        self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            deadline_ms = self.config.deadline.as_millis() as u64,
            "evaluation timed out"
        );
        TaggedResult::Timeout
    }

    fn lost_worker(&self) -> TaggedResult {
        self.stats.worker_failures.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("evaluation worker exited without a result");
        TaggedResult::Invalid
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}
