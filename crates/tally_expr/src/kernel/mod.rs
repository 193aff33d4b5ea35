//! # Arithmetic Kernel
//!
//! Evaluates kernel syntax (the output of [`crate::rewrite`]) to an
//! [`ExactDecimal`]. Nothing here is dynamic: the only inputs are literals
//! and a closed set of operators, so there are no names to resolve and no
//! way to reach anything outside the arithmetic.
//!
//! ```text
//! "2**3+1" ──► lexer ──► parser ──► Evaluator ──► finalize ──► 9
//! ```

pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::Evaluator;
pub use parser::{BinaryOp, Expr, UnaryOp, MAX_DEPTH};

use crate::budget::Budget;
use crate::decimal::{
    DecimalContext, ExactDecimal, DEFAULT_FRACTIONAL_DIGITS, DEFAULT_PRECISION,
    MAX_FRACTIONAL_DIGITS,
};
use crate::error::KernelResult;

/// Numeric knobs for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorSettings {
    /// Working precision in digits.
    pub precision: u64,
    /// Places kept after the point in the final result.
    pub fractional_digits: u32,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            fractional_digits: DEFAULT_FRACTIONAL_DIGITS,
        }
    }
}

/// Parses and evaluates `expr`, then quantises the result.
///
/// Runs on the calling thread. Untrusted input goes through
/// [`crate::sandbox::Sandbox`] instead.
///
/// # Errors
///
/// Any [`crate::error::KernelError`] raised along the way.
pub fn evaluate(
    expr: &str,
    settings: &EvaluatorSettings,
    budget: &Budget,
) -> KernelResult<ExactDecimal> {
    let tokens = lexer::tokenize(expr)?;
    let tree = parser::parse(&tokens)?;
    let ctx = DecimalContext::new(settings.precision).with_budget(budget.clone());
    let value = Evaluator::new(&ctx).eval(&tree)?;
    ctx.finalize(&value, settings.fractional_digits.min(MAX_FRACTIONAL_DIGITS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;

    fn eval(expr: &str) -> KernelResult<ExactDecimal> {
        evaluate(expr, &EvaluatorSettings::default(), &Budget::unlimited())
    }

    #[test]
    fn test_finalized_output() {
        assert_eq!(eval("1/3").unwrap().to_string(), "0.33333333333333333333");
        assert_eq!(eval("2/3").unwrap().to_string(), "0.66666666666666666667");
        assert_eq!(eval("0.1+0.2").unwrap().to_string(), "0.3");
        assert_eq!(eval("10/4").unwrap().to_string(), "2.5");
    }

    #[test]
    fn test_tiny_results_round_to_zero() {
        assert_eq!(eval("1/10**30").unwrap(), ExactDecimal::zero());
    }

    #[test]
    fn test_error_tags() {
        assert_eq!(eval("1/0"), Err(KernelError::DivideByZero));
        assert_eq!(eval("99999999999**99999999999"), Err(KernelError::Overflow));
        assert!(matches!(eval("1+"), Err(KernelError::Invalid(_))));
    }

    #[test]
    fn test_fewer_fractional_digits() {
        let settings = EvaluatorSettings {
            fractional_digits: 2,
            ..EvaluatorSettings::default()
        };
        let value = evaluate("2/3", &settings, &Budget::unlimited()).unwrap();
        assert_eq!(value.to_string(), "0.67");
    }
}
