//! Fixed-point `ln` and `exp` behind fractional powers.
//!
//! Values are integers scaled by `10^places`. `places` carries guard digits
//! over the requested precision plus the width of `y · ln x`, so the error
//! amplified by the final exponential stays below the last kept digit.

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{ToPrimitive, Zero};

use super::{digit_count, div_round_half_even, ten_pow, ExactDecimal};
use crate::budget::Budget;
use crate::error::{KernelError, KernelResult};

const GUARD_DIGITS: u64 = 20;

/// `exp` works on `r / 2^EXP_HALVINGS` and squares back up.
const EXP_HALVINGS: u32 = 12;

/// `atanh(t)` for `|t| < 1/2`, fixed point.
fn atanh(t: &BigInt, scale: &BigInt, budget: &Budget) -> KernelResult<BigInt> {
    let t_squared = (t * t) / scale;
    let mut power = t.clone();
    let mut sum = BigInt::zero();
    let mut k = 1u64;
    while !power.is_zero() {
        budget.check()?;
        sum += &power / k;
        power = (&power * &t_squared) / scale;
        k += 2;
    }
    Ok(sum)
}

struct FixedPoint {
    places: u64,
    scale: BigInt,
    ln2: BigInt,
    ln10: BigInt,
}

impl FixedPoint {
    fn new(places: u64, budget: &Budget) -> KernelResult<Self> {
        let scale = BigInt::from(ten_pow(places));
        // ln 2 = 2 atanh(1/3), ln 10 = 3 ln 2 + ln 1.25 = 3 ln 2 + 2 atanh(1/9)
        let ln2 = atanh(&(&scale / 3u32), &scale, budget)? * 2u32;
        let ln10 = &ln2 * 3u32 + atanh(&(&scale / 9u32), &scale, budget)? * 2u32;
        Ok(Self {
            places,
            scale,
            ln2,
            ln10,
        })
    }

    /// `ln(v)` for `v > 0`.
    fn ln(&self, v: &BigUint, budget: &Budget) -> KernelResult<BigInt> {
        let shift = digit_count(v) - 1;
        let mut mantissa = if shift >= self.places {
            BigInt::from(v / ten_pow(shift - self.places))
        } else {
            BigInt::from(v * ten_pow(self.places - shift))
        };

        // mantissa / scale is in [1, 10); halve it into [1, 2).
        let two = &self.scale * 2u32;
        let mut halvings = 0u32;
        while mantissa >= two {
            mantissa >>= 1u32;
            halvings += 1;
        }

        let t = ((&mantissa - &self.scale) * &self.scale) / (&mantissa + &self.scale);
        let ln_mantissa = atanh(&t, &self.scale, budget)? * 2u32;
        Ok(ln_mantissa + &self.ln2 * halvings + &self.ln10 * shift)
    }

    /// `exp(z)` as `(coefficient, exponent)` meaning `coefficient × 10^exponent`.
    fn exp(&self, z: &BigInt, budget: &Budget) -> KernelResult<(BigInt, i64)> {
        // z = k ln 10 + r with |r| <= ln 10 / 2
        let half_ln10: BigInt = &self.ln10 >> 1u32;
        let k = (z + half_ln10).div_floor(&self.ln10);
        let r: BigInt = (z - &k * &self.ln10) >> EXP_HALVINGS;

        let mut term = self.scale.clone();
        let mut sum = self.scale.clone();
        let mut i = 1u64;
        loop {
            budget.check()?;
            term = (&term * &r) / (&self.scale * i);
            if term.is_zero() {
                break;
            }
            sum += &term;
            i += 1;
        }
        for _ in 0..EXP_HALVINGS {
            sum = (&sum * &sum) / &self.scale;
        }

        let decades = k.to_i64().ok_or(KernelError::Overflow)?;
        Ok((sum, decades - self.places as i64))
    }
}

/// `base ** exponent` to `digits` significant digits, for a positive base.
pub(super) fn pow_approx(
    base: &ExactDecimal,
    exponent: &ExactDecimal,
    digits: u64,
    budget: &Budget,
) -> KernelResult<ExactDecimal> {
    let spread = (exponent.approx_f64() * base.log10_abs() * std::f64::consts::LN_10).abs();
    let spread_digits = if spread.is_finite() && spread >= 1.0 {
        spread.log10().ceil() as u64 + 1
    } else {
        1
    };
    let fixed = FixedPoint::new(digits + GUARD_DIGITS + spread_digits, budget)?;

    let ln_base =
        fixed.ln(base.numer().magnitude(), budget)? - fixed.ln(base.denom().magnitude(), budget)?;
    let z = (ln_base * exponent.numer()).div_floor(exponent.denom());
    let (coefficient, exponent10) = fixed.exp(&z, budget)?;

    let surplus = digit_count(coefficient.magnitude()).saturating_sub(digits);
    let rounded = div_round_half_even(&coefficient, &BigInt::from(ten_pow(surplus)));
    ExactDecimal::from_scaled(rounded, exponent10 + surplus as i64)
}
