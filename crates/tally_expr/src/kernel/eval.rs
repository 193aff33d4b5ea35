//! Tree walker.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use super::parser::{BinaryOp, Expr, UnaryOp};
use crate::decimal::{DecimalContext, ExactDecimal};
use crate::error::{KernelError, KernelResult};

/// Evaluates expression trees under one [`DecimalContext`].
#[derive(Debug)]
pub struct Evaluator<'a> {
    ctx: &'a DecimalContext,
}

impl<'a> Evaluator<'a> {
    /// Binds an evaluator to a context.
    #[must_use]
    pub fn new(ctx: &'a DecimalContext) -> Self {
        Self { ctx }
    }

    /// Evaluates `expr`. Every node polls the context's budget.
    ///
    /// # Errors
    ///
    /// Whatever the arithmetic raises; see [`DecimalContext`].
    pub fn eval(&self, expr: &Expr) -> KernelResult<ExactDecimal> {
        self.ctx.budget().check()?;
        match expr {
            Expr::Literal(value) => self.ctx.admit(value.clone()),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Plus => Ok(value),
                    UnaryOp::Neg => Ok(-value),
                    UnaryOp::Invert => {
                        let integer = value.to_integer_half_even();
                        self.ctx.admit(ExactDecimal::from_integer(!integer))
                    }
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                match op {
                    BinaryOp::Add => self.ctx.add(&left, &right),
                    BinaryOp::Sub => self.ctx.sub(&left, &right),
                    BinaryOp::Mul => self.ctx.mul(&left, &right),
                    BinaryOp::Div => self.ctx.div(&left, &right),
                    BinaryOp::FloorDiv => self.ctx.floor_div(&left, &right),
                    BinaryOp::Rem => self.ctx.rem(&left, &right),
                    BinaryOp::Pow => self.ctx.pow(&left, &right),
                    BinaryOp::BitAnd => self.integer_op(&left, &right, |a, b| Ok(a & b)),
                    BinaryOp::BitOr => self.integer_op(&left, &right, |a, b| Ok(a | b)),
                    BinaryOp::BitXor => self.integer_op(&left, &right, |a, b| Ok(a ^ b)),
                    BinaryOp::Shl => {
                        self.integer_op(&left, &right, |a, b| self.shift_left(&a, &b))
                    }
                    BinaryOp::Shr => self.integer_op(&left, &right, |a, b| shift_right(&a, &b)),
                }
            }
        }
    }

    /// Bitwise operators round both operands to integers (ties to even) and
    /// use two's-complement semantics on the result.
    fn integer_op(
        &self,
        left: &ExactDecimal,
        right: &ExactDecimal,
        apply: impl FnOnce(BigInt, BigInt) -> KernelResult<BigInt>,
    ) -> KernelResult<ExactDecimal> {
        let result = apply(left.to_integer_half_even(), right.to_integer_half_even())?;
        self.ctx.admit(ExactDecimal::from_integer(result))
    }

    fn shift_left(&self, value: &BigInt, count: &BigInt) -> KernelResult<BigInt> {
        if count.is_negative() {
            return Err(KernelError::invalid("negative shift count"));
        }
        if value.is_zero() {
            return Ok(BigInt::zero());
        }
        // Reject before allocating: value << count has about bits + count bits.
        let bits = count.to_f64().unwrap_or(f64::INFINITY) + value.bits() as f64;
        if bits * std::f64::consts::LOG10_2 > self.ctx.precision() as f64 + 2.0 {
            return Err(KernelError::Overflow);
        }
        let count = count.to_u64().ok_or(KernelError::Overflow)?;
        Ok(value << count)
    }
}

fn shift_right(value: &BigInt, count: &BigInt) -> KernelResult<BigInt> {
    if count.is_negative() {
        return Err(KernelError::invalid("negative shift count"));
    }
    match count.to_u64() {
        Some(count) if count < value.bits() => Ok(value >> count),
        // Everything shifted out: floor gives 0 or -1.
        _ => Ok(if value.is_negative() {
            BigInt::from(-1)
        } else {
            BigInt::zero()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{lexer::tokenize, parser::parse};
    use super::*;

    fn run(text: &str) -> KernelResult<ExactDecimal> {
        let ctx = DecimalContext::default();
        Evaluator::new(&ctx).eval(&parse(&tokenize(text)?)?)
    }

    fn value(text: &str) -> String {
        run(text).unwrap().to_string()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(value("1+2*3"), "7");
        assert_eq!(value("(1+2)*3"), "9");
        assert_eq!(value("7//2"), "3");
        assert_eq!(value("-7%3"), "2");
        assert_eq!(value("2**3**2"), "512");
        assert_eq!(value("-2**2"), "4");
        assert_eq!(value("1/4"), "0.25");
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(value("6&3"), "2");
        assert_eq!(value("6|3"), "7");
        assert_eq!(value("6^3"), "5");
        assert_eq!(value("~5"), "-6");
        assert_eq!(value("1<<10"), "1024");
        assert_eq!(value("1024>>3"), "128");
        assert_eq!(value("-1>>100"), "-1");
        assert_eq!(value("5>>100"), "0");
    }

    #[test]
    fn test_bitwise_rounds_operands_half_even() {
        assert_eq!(value("2.5|0"), "2");
        assert_eq!(value("3.5|0"), "4");
        assert_eq!(value("~2.5"), "-3");
    }

    #[test]
    fn test_negative_shift_is_invalid() {
        assert!(matches!(run("1<<-1"), Err(KernelError::Invalid(_))));
        assert!(matches!(run("1>>-1"), Err(KernelError::Invalid(_))));
    }

    #[test]
    fn test_huge_shift_overflows() {
        assert_eq!(run("1<<99999999999"), Err(KernelError::Overflow));
        assert_eq!(run("0<<99999999999").unwrap(), ExactDecimal::zero());
    }

    #[test]
    fn test_precedence_mix() {
        // (1 + 2) << 1 = 6; 6 & 7 = 6
        assert_eq!(value("1+2<<1&7"), "6");
        assert_eq!(value("2*3**2"), "18");
    }
}
