//! Arithmetic under a precision ceiling.

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use super::{
    exact_nth_root_within, exceeds_digits, gcd_within, ten_pow, transcendental, ExactDecimal,
};
use crate::budget::Budget;
use crate::error::{KernelError, KernelResult};

/// Default working precision in significant digits (2^20 - 1).
pub const DEFAULT_PRECISION: u64 = (1 << 20) - 1;

/// Smallest working precision a context accepts.
pub const MIN_PRECISION: u64 = 64;

/// Largest working precision a context accepts.
pub const MAX_PRECISION: u64 = (1 << 24) - 1;

/// Default number of places kept after the point in a final result.
pub const DEFAULT_FRACTIONAL_DIGITS: u32 = 20;

/// Largest number of places a final result may keep.
pub const MAX_FRACTIONAL_DIGITS: u32 = 40;

/// Significant digits computed for a fractional power with no exact value.
pub const FRACTIONAL_POWER_DIGITS: u64 = 50;

/// Largest root degree tried when looking for an exact fractional power.
const EXACT_ROOT_LIMIT: u32 = 64;

/// Slack (in decades) before a float size estimate is trusted on its own.
const ESTIMATE_SLACK: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Magnitude {
    InRange,
    TooLarge,
    TooSmall,
}

/// Precision ceiling plus the budget every operation polls.
///
/// With precision `P`:
///
/// | Condition | Error |
/// |-----------|-------|
/// | `|x| >= 10^P` | [`KernelError::Overflow`] |
/// | `0 < |x| < 10^-P` | [`KernelError::Underflow`] |
/// | numerator or denominator longer than `P` digits | [`KernelError::PrecisionError`] |
#[derive(Debug, Clone)]
pub struct DecimalContext {
    precision: u64,
    budget: Budget,
}

impl DecimalContext {
    /// A context with the given precision, clamped to
    /// [`MIN_PRECISION`]..=[`MAX_PRECISION`].
    #[must_use]
    pub fn new(precision: u64) -> Self {
        Self {
            precision: precision.clamp(MIN_PRECISION, MAX_PRECISION),
            budget: Budget::unlimited(),
        }
    }

    /// Attaches a budget.
    #[must_use]
    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    /// Working precision in digits.
    #[must_use]
    pub fn precision(&self) -> u64 {
        self.precision
    }

    /// The budget polled by every operation.
    #[must_use]
    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    fn magnitude(&self, x: &ExactDecimal) -> Magnitude {
        if x.is_zero() {
            return Magnitude::InRange;
        }
        let p = self.precision as f64;
        let estimate = x.log10_abs();
        if estimate > p + 1.0 {
            return Magnitude::TooLarge;
        }
        if estimate < -p - 1.0 {
            return Magnitude::TooSmall;
        }
        if estimate < p - 1.0 && estimate > 1.0 - p {
            return Magnitude::InRange;
        }

        // Near a boundary: settle it exactly.
        let scale = BigInt::from(ten_pow(self.precision));
        let numer = x.numer().abs();
        if numer >= x.denom() * &scale {
            Magnitude::TooLarge
        } else if numer * &scale < *x.denom() {
            Magnitude::TooSmall
        } else {
            Magnitude::InRange
        }
    }

    /// Rejects results whose float size estimate is far outside the range,
    /// before they are computed.
    fn guard_estimate(&self, log10_estimate: f64) -> KernelResult<()> {
        let p = self.precision as f64;
        if log10_estimate > p + ESTIMATE_SLACK {
            Err(KernelError::Overflow)
        } else if log10_estimate < -p - ESTIMATE_SLACK {
            Err(KernelError::Underflow)
        } else {
            Ok(())
        }
    }

    /// Checks a value against the ceiling and hands it back.
    ///
    /// # Errors
    ///
    /// Overflow, underflow and precision errors as described on the type,
    /// or [`KernelError::Cancelled`] once the budget is gone.
    pub fn admit(&self, x: ExactDecimal) -> KernelResult<ExactDecimal> {
        self.budget.check()?;
        match self.magnitude(&x) {
            Magnitude::TooLarge => return Err(KernelError::Overflow),
            Magnitude::TooSmall => return Err(KernelError::Underflow),
            Magnitude::InRange => {}
        }
        if exceeds_digits(x.numer().magnitude(), self.precision)
            || exceeds_digits(x.denom().magnitude(), self.precision)
        {
            return Err(KernelError::PrecisionError);
        }
        Ok(x)
    }

    /// `a + b`.
    ///
    /// # Errors
    ///
    /// See [`DecimalContext::admit`].
    pub fn add(&self, a: &ExactDecimal, b: &ExactDecimal) -> KernelResult<ExactDecimal> {
        self.budget.check()?;
        let sum = if a.denom() == b.denom() {
            ExactDecimal::reduced_within(a.numer() + b.numer(), a.denom().clone(), &self.budget)?
        } else {
            ExactDecimal::reduced_within(
                a.numer() * b.denom() + b.numer() * a.denom(),
                a.denom() * b.denom(),
                &self.budget,
            )?
        };
        self.admit(sum)
    }

    /// `a - b`.
    ///
    /// # Errors
    ///
    /// See [`DecimalContext::admit`].
    pub fn sub(&self, a: &ExactDecimal, b: &ExactDecimal) -> KernelResult<ExactDecimal> {
        self.add(a, &-b)
    }

    /// `a * b`.
    ///
    /// # Errors
    ///
    /// See [`DecimalContext::admit`].
    pub fn mul(&self, a: &ExactDecimal, b: &ExactDecimal) -> KernelResult<ExactDecimal> {
        self.budget.check()?;
        if a.is_zero() || b.is_zero() {
            return Ok(ExactDecimal::zero());
        }
        self.guard_estimate(a.log10_abs() + b.log10_abs())?;

        let product = if a.is_integer() && b.is_integer() {
            ExactDecimal::from_integer(a.numer() * b.numer())
        } else {
            // Cross-cancel so the product is already in lowest terms.
            let g1 = gcd_within(a.numer(), b.denom(), &self.budget)?;
            let g2 = gcd_within(b.numer(), a.denom(), &self.budget)?;
            ExactDecimal::reduced_within(
                cancel(a.numer(), &g1) * cancel(b.numer(), &g2),
                cancel(a.denom(), &g2) * cancel(b.denom(), &g1),
                &self.budget,
            )?
        };
        self.admit(product)
    }

    /// `a / b`.
    ///
    /// # Errors
    ///
    /// [`KernelError::DivideByZero`] when `b` is zero, otherwise see
    /// [`DecimalContext::admit`].
    pub fn div(&self, a: &ExactDecimal, b: &ExactDecimal) -> KernelResult<ExactDecimal> {
        let inverse = b.recip()?;
        self.mul(a, &inverse)
    }

    /// `floor(a / b)`.
    ///
    /// # Errors
    ///
    /// [`KernelError::DivideByZero`] when `b` is zero, otherwise see
    /// [`DecimalContext::admit`].
    pub fn floor_div(&self, a: &ExactDecimal, b: &ExactDecimal) -> KernelResult<ExactDecimal> {
        self.budget.check()?;
        if b.is_zero() {
            return Err(KernelError::DivideByZero);
        }
        if a.is_zero() {
            return Ok(ExactDecimal::zero());
        }
        if a.log10_abs() - b.log10_abs() > self.precision as f64 + ESTIMATE_SLACK {
            return Err(KernelError::Overflow);
        }
        let numer = a.numer() * b.denom();
        let denom = a.denom() * b.numer();
        self.admit(ExactDecimal::from_integer(numer.div_floor(&denom)))
    }

    /// `a - b * floor(a / b)`: the result takes the sign of `b`.
    ///
    /// # Errors
    ///
    /// [`KernelError::DivideByZero`] when `b` is zero, otherwise see
    /// [`DecimalContext::admit`].
    pub fn rem(&self, a: &ExactDecimal, b: &ExactDecimal) -> KernelResult<ExactDecimal> {
        self.budget.check()?;
        if b.is_zero() {
            return Err(KernelError::DivideByZero);
        }
        if a.is_zero() {
            return Ok(ExactDecimal::zero());
        }
        // a/b = numer/denom, so a - b*floor(a/b) = (numer mod denom) / (a.denom * b.denom).
        let numer = a.numer() * b.denom();
        let denom = a.denom() * b.numer();
        let remainder = numer.mod_floor(&denom);
        self.admit(ExactDecimal::reduced_within(
            remainder,
            a.denom() * b.denom(),
            &self.budget,
        )?)
    }

    /// `base ** exponent`.
    ///
    /// Integral exponents are exact. A fractional exponent is exact when the
    /// matching root of the base is rational (`4 ** 0.5`, `8 ** (1/3)`);
    /// otherwise the power is computed to
    /// `min(precision, FRACTIONAL_POWER_DIGITS)` significant digits.
    ///
    /// # Errors
    ///
    /// - `0 ** 0` and a negative base with a fractional exponent are
    ///   [`KernelError::Invalid`]
    /// - zero to a negative power is [`KernelError::DivideByZero`]
    /// - otherwise see [`DecimalContext::admit`]
    pub fn pow(&self, base: &ExactDecimal, exponent: &ExactDecimal) -> KernelResult<ExactDecimal> {
        self.budget.check()?;
        if exponent.is_integer() {
            return self.pow_integer(base, exponent.numer());
        }
        if base.is_negative() {
            return Err(KernelError::invalid(
                "negative base with a fractional exponent",
            ));
        }
        if base.is_zero() {
            return if exponent.is_negative() {
                Err(KernelError::DivideByZero)
            } else {
                Ok(ExactDecimal::zero())
            };
        }
        if base.is_one() {
            return Ok(ExactDecimal::one());
        }
        self.guard_estimate(exponent.approx_f64() * base.log10_abs())?;

        if let Some(root) = self.exact_root(base, exponent.denom())? {
            return self.pow_integer(&root, exponent.numer());
        }

        let digits = self.precision.min(FRACTIONAL_POWER_DIGITS);
        let approx = transcendental::pow_approx(base, exponent, digits, &self.budget)?;
        self.admit(approx)
    }

    fn pow_integer(&self, base: &ExactDecimal, exponent: &BigInt) -> KernelResult<ExactDecimal> {
        if base.is_zero() {
            return match exponent.sign() {
                Sign::Plus => Ok(ExactDecimal::zero()),
                Sign::NoSign => Err(KernelError::invalid("0 ** 0 is undefined")),
                Sign::Minus => Err(KernelError::DivideByZero),
            };
        }
        if exponent.is_zero() {
            return Ok(ExactDecimal::one());
        }
        if base.is_integer() && base.numer().magnitude().is_one() {
            let flips = base.is_negative() && exponent.is_odd();
            return Ok(if flips {
                -ExactDecimal::one()
            } else {
                ExactDecimal::one()
            });
        }

        let exponent_f = exponent.to_f64().unwrap_or(if exponent.is_negative() {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
        self.guard_estimate(exponent_f * base.log10_abs())?;

        // The exact power keeps every digit of numerator and denominator.
        let widest = super::log10_biguint(base.numer().magnitude())
            .max(super::log10_biguint(base.denom().magnitude()));
        if exponent_f.abs() * widest > self.precision as f64 + ESTIMATE_SLACK {
            return Err(KernelError::PrecisionError);
        }

        let power = exponent.magnitude().to_u32().ok_or(KernelError::Overflow)?;
        self.budget.check()?;
        // Powers of coprime parts stay coprime.
        let raised = ExactDecimal::from_coprime(base.numer().pow(power), base.denom().pow(power));
        let result = if exponent.is_negative() {
            raised.recip()?
        } else {
            raised
        };
        self.admit(result)
    }

    /// `base ^ (1/degree)` when it is rational and `degree` is small.
    fn exact_root(&self, base: &ExactDecimal, degree: &BigInt) -> KernelResult<Option<ExactDecimal>> {
        let Some(degree) = degree.to_u32().filter(|d| *d <= EXACT_ROOT_LIMIT) else {
            return Ok(None);
        };
        self.budget.check()?;
        let Some(root_numer) =
            exact_nth_root_within(base.numer().magnitude(), degree, &self.budget)?
        else {
            return Ok(None);
        };
        let Some(root_denom) =
            exact_nth_root_within(base.denom().magnitude(), degree, &self.budget)?
        else {
            return Ok(None);
        };
        // Roots of coprime parts stay coprime.
        Ok(Some(ExactDecimal::from_coprime(
            BigInt::from(root_numer),
            BigInt::from(root_denom),
        )))
    }

    /// Quantises a final result to `fractional_digits` places (ties to even)
    /// and drops trailing zeros.
    ///
    /// # Errors
    ///
    /// [`KernelError::PrecisionError`] when the quantised coefficient needs
    /// more than `precision` digits.
    pub fn finalize(&self, x: &ExactDecimal, fractional_digits: u32) -> KernelResult<ExactDecimal> {
        self.budget.check()?;
        let scale = BigInt::from(ten_pow(u64::from(fractional_digits)));
        let quantized = super::div_round_half_even(&(x.numer() * &scale), x.denom());
        if exceeds_digits(quantized.magnitude(), self.precision) {
            return Err(KernelError::PrecisionError);
        }
        ExactDecimal::reduced_within(quantized, scale, &self.budget)
    }
}

/// `value / common`, skipping the division when there is nothing to cancel.
fn cancel(value: &BigInt, common: &BigInt) -> BigInt {
    if common.is_one() {
        value.clone()
    } else {
        value / common
    }
}

impl Default for DecimalContext {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION)
    }
}
