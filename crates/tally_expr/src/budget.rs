//! # Evaluation Budget
//!
//! A cancellation token shared between the sandbox and its worker.
//!
//! The kernel polls [`Budget::check`] inside every loop whose trip count
//! depends on the input. The sandbox trips the flag when the deadline passes;
//! the worker notices at its next poll and unwinds with
//! [`KernelError::Cancelled`]. Nothing outside the worker is touched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{KernelError, KernelResult};

/// Shared cancellation flag plus an optional wall-clock deadline.
#[derive(Clone, Debug)]
pub struct Budget {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Budget {
    /// A budget that never runs out. Used for direct kernel calls and tests.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// A budget that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Trips the flag. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once cancelled or past the deadline.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Polls the budget.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Cancelled`] once the budget is exhausted.
    #[inline]
    pub fn check(&self) -> KernelResult<()> {
        if self.is_exhausted() {
            Err(KernelError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_never_exhausts() {
        let budget = Budget::unlimited();
        assert!(budget.check().is_ok());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let budget = Budget::unlimited();
        let worker = budget.clone();
        budget.cancel();
        assert_eq!(worker.check(), Err(KernelError::Cancelled));
    }

    #[test]
    fn test_deadline_expires() {
        let budget = Budget::with_timeout(Duration::ZERO);
        assert!(budget.is_exhausted());
    }
}
