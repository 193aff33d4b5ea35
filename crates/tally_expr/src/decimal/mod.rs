//! # Exact Decimal Numbers
//!
//! **NO FLOATING POINT IN THE RESULT PATH**
//!
//! [`ExactDecimal`] is the evaluator's only number type. It is kept as a
//! reduced fraction of two arbitrary-precision integers and rendered as a
//! decimal on demand, so:
//!
//! - `0.1 + 0.2 == 0.3` exactly
//! - `1 / 3 * 3 == 1` exactly; no division ever rounds
//! - the only rounding happens at the very end (see [`DecimalContext::finalize`])
//!   and in fractional powers, which have no exact value to keep
//!
//! The working precision bounds how large the numerator, the denominator and
//! the magnitude may grow; see [`DecimalContext`].
//!
//! Bitwise operators never see fractions: they call
//! [`ExactDecimal::to_integer_half_even`] on their operands and lift the
//! integer result back with [`ExactDecimal::from_integer`].

mod context;
mod transcendental;

pub use context::{
    DecimalContext, DEFAULT_FRACTIONAL_DIGITS, DEFAULT_PRECISION, FRACTIONAL_POWER_DIGITS,
    MAX_FRACTIONAL_DIGITS, MAX_PRECISION, MIN_PRECISION,
};

use std::cmp::Ordering;
use std::fmt;
use std::ops::Neg;

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::budget::Budget;
use crate::error::{KernelError, KernelResult};

const LOG10_2: f64 = std::f64::consts::LOG10_2;

/// Largest power of ten the evaluator will materialise.
pub(crate) const MAX_SCALE_DIGITS: u64 = 1 << 28;

/// Digits shown after the point when a value has no finite expansion.
const DISPLAY_REPEATING_DIGITS: u32 = 20;

// =============================================================================
// Digit arithmetic helpers
// =============================================================================

/// `10^k` without a bound check. Callers keep `k` within [`MAX_SCALE_DIGITS`].
pub(crate) fn ten_pow(k: u64) -> BigUint {
    if k < 20 {
        BigUint::from(10u64.pow(k as u32))
    } else {
        BigUint::from(10u32).pow(k as u32)
    }
}

/// `10^k`, refusing absurd scales.
pub(crate) fn pow10(k: u64) -> KernelResult<BigUint> {
    if k > MAX_SCALE_DIGITS {
        return Err(KernelError::Memory);
    }
    Ok(ten_pow(k))
}

/// Number of decimal digits of `v` (zero has one digit).
pub(crate) fn digit_count(v: &BigUint) -> u64 {
    let bits = v.bits();
    if bits <= 64 {
        let small = v.to_u64().unwrap_or(0);
        return small.checked_ilog10().map_or(1, |d| u64::from(d) + 1);
    }
    // The true count is within one of this estimate either way.
    let estimate = ((bits - 1) as f64 * LOG10_2).floor() as u64 + 1;
    let floor = ten_pow(estimate - 1);
    if v < &floor {
        estimate - 1
    } else if v >= &(floor * 10u32) {
        estimate + 1
    } else {
        estimate
    }
}

/// True when `v` has more than `limit` decimal digits.
pub(crate) fn exceeds_digits(v: &BigUint, limit: u64) -> bool {
    let bits = v.bits();
    let limit_f = limit as f64;
    if bits.saturating_sub(1) as f64 * LOG10_2 > limit_f + 1.0 {
        return true;
    }
    if bits as f64 * LOG10_2 + 1.0 < limit_f {
        return false;
    }
    digit_count(v) > limit
}

/// `log10(v)` for `v > 0`, good to about fifteen significant digits.
pub(crate) fn log10_biguint(v: &BigUint) -> f64 {
    let bits = v.bits();
    if bits <= 960 {
        return v.to_f64().map_or(f64::INFINITY, f64::log10);
    }
    let shift = bits - 64;
    let top = (v >> shift).to_f64().unwrap_or(f64::MAX);
    top.log10() + shift as f64 * LOG10_2
}

/// Below this size both operands go straight to the library gcd.
const GCD_CUTOVER_BITS: u64 = 1 << 12;

/// Euclid's algorithm one remainder at a time.
///
/// A remainder against a short operand costs one linear pass, so the usual
/// case (a huge numerator over a small denominator) finishes in a step or
/// two. Operands of similar size take many steps; callers holding a
/// [`Budget`] poll it between them.
struct Euclid {
    larger: BigUint,
    smaller: BigUint,
}

impl Euclid {
    fn new(a: &BigUint, b: &BigUint) -> Self {
        let (larger, smaller) = if a >= b { (a, b) } else { (b, a) };
        Self {
            larger: larger.clone(),
            smaller: smaller.clone(),
        }
    }

    /// One step. `Some(gcd)` once finished.
    fn step(&mut self) -> Option<BigUint> {
        if self.smaller.is_zero() {
            return Some(std::mem::take(&mut self.larger));
        }
        if self.smaller.is_one() {
            return Some(BigUint::one());
        }
        if self.larger.bits() <= GCD_CUTOVER_BITS {
            return Some(self.larger.gcd(&self.smaller));
        }
        let remainder = &self.larger % &self.smaller;
        self.larger = std::mem::replace(&mut self.smaller, remainder);
        None
    }
}

/// `gcd(|a|, |b|)`.
pub(crate) fn gcd(a: &BigInt, b: &BigInt) -> BigInt {
    let mut euclid = Euclid::new(a.magnitude(), b.magnitude());
    loop {
        if let Some(common) = euclid.step() {
            return BigInt::from(common);
        }
    }
}

/// `gcd(|a|, |b|)`, polling `budget` between steps.
pub(crate) fn gcd_within(a: &BigInt, b: &BigInt, budget: &Budget) -> KernelResult<BigInt> {
    let mut euclid = Euclid::new(a.magnitude(), b.magnitude());
    loop {
        if let Some(common) = euclid.step() {
            return Ok(BigInt::from(common));
        }
        budget.check()?;
    }
}

/// Small primes for the power-residue filter in [`nth_root_within`].
const RESIDUE_PRIMES: [u64; 24] = [
    7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97, 101,
    103,
];

fn pow_mod(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    let mut acc = 1u64;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc * base % modulus;
        }
        base = base * base % modulus;
        exp >>= 1;
    }
    acc
}

/// False when some small prime proves `n` is not a perfect `degree`-th power.
fn may_be_perfect_power(n: &BigUint, degree: u32) -> bool {
    let degree = u64::from(degree);
    RESIDUE_PRIMES.iter().all(|&p| {
        let g = degree.gcd(&(p - 1));
        if g == 1 {
            return true;
        }
        let residue = (n % BigUint::from(p)).to_u64().unwrap_or(0);
        residue == 0 || pow_mod(residue, (p - 1) / g, p) == 1
    })
}

/// First Newton guess for `n^(1/degree)`, from the top bits of `n`.
fn root_guess(n: &BigUint, degree: u32) -> BigUint {
    let bits = n.bits();
    let shift = bits.saturating_sub(64);
    let top = (n >> shift).to_f64().unwrap_or(1.0);
    let root_log2 = (top.log2() + shift as f64) / f64::from(degree);
    if root_log2 < 63.0 {
        return BigUint::from((2f64.powf(root_log2) as u64).max(1));
    }
    let whole = root_log2.floor();
    let mantissa = 2f64.powf(root_log2 - whole + 52.0) as u64;
    BigUint::from(mantissa) << (whole as u64 - 52)
}

/// `floor(n^(1/degree))` by integer Newton steps, polling `budget`.
///
/// Returns `None` when a cheap residue test already shows the root is not
/// exact.
pub(crate) fn exact_nth_root_within(
    n: &BigUint,
    degree: u32,
    budget: &Budget,
) -> KernelResult<Option<BigUint>> {
    if degree <= 1 || n.is_zero() || n.is_one() {
        return Ok(Some(n.clone()));
    }
    if !may_be_perfect_power(n, degree) {
        return Ok(None);
    }
    let root = nth_root_within(n, degree, budget)?;
    budget.check()?;
    Ok((root.pow(degree) == *n).then_some(root))
}

fn nth_root_within(n: &BigUint, degree: u32, budget: &Budget) -> KernelResult<BigUint> {
    let newton = |x: &BigUint| -> BigUint {
        let lower = n / x.pow(degree - 1);
        (x * (degree - 1) + lower) / degree
    };
    // One step from any positive guess lands on or above the root; from
    // there the iteration only decreases.
    let mut x = newton(&root_guess(n, degree));
    loop {
        budget.check()?;
        if x.is_zero() {
            return Ok(x);
        }
        let next = newton(&x);
        if next >= x {
            return Ok(x);
        }
        x = next;
    }
}

/// `n / d` rounded half to even. `d` must be positive.
pub(crate) fn div_round_half_even(n: &BigInt, d: &BigInt) -> BigInt {
    let (quotient, remainder) = n.div_mod_floor(d);
    let twice: BigInt = remainder << 1u32;
    match twice.cmp(d) {
        Ordering::Less => quotient,
        Ordering::Greater => quotient + 1,
        Ordering::Equal => {
            if quotient.is_odd() {
                quotient + 1
            } else {
                quotient
            }
        }
    }
}

// =============================================================================
// ExactDecimal
// =============================================================================

/// An exact signed number with a decimal face.
///
/// Invariants: the denominator is positive, numerator and denominator share
/// no common factor, and zero is `0/1`. Equality is therefore structural.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ExactDecimal {
    numer: BigInt,
    denom: BigInt,
}

impl ExactDecimal {
    /// Zero.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            numer: BigInt::zero(),
            denom: BigInt::one(),
        }
    }

    /// One.
    #[must_use]
    pub fn one() -> Self {
        Self::from_integer(BigInt::one())
    }

    /// Lifts an integer.
    #[must_use]
    pub fn from_integer(value: impl Into<BigInt>) -> Self {
        Self {
            numer: value.into(),
            denom: BigInt::one(),
        }
    }

    /// Builds `numer / denom` in lowest terms.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::DivideByZero`] when `denom` is zero.
    pub fn from_ratio(numer: BigInt, denom: BigInt) -> KernelResult<Self> {
        if denom.is_zero() {
            return Err(KernelError::DivideByZero);
        }
        Ok(Self::reduced(numer, denom))
    }

    /// `coefficient × 10^exponent`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Memory`] for absurd exponents.
    pub fn from_scaled(coefficient: BigInt, exponent: i64) -> KernelResult<Self> {
        let scale = BigInt::from(pow10(exponent.unsigned_abs())?);
        if exponent >= 0 {
            Ok(Self::from_integer(coefficient * scale))
        } else {
            Ok(Self::reduced(coefficient, scale))
        }
    }

    /// Parses a plain decimal literal: digits with at most one `.`.
    ///
    /// `1`, `1.5`, `.5` and `5.` are accepted; the value is exact.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Invalid`] for anything else.
    pub fn parse_literal(text: &str) -> KernelResult<Self> {
        let (whole, fraction) = match text.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (text, ""),
        };
        let well_formed = !(whole.is_empty() && fraction.is_empty())
            && whole.bytes().all(|b| b.is_ascii_digit())
            && fraction.bytes().all(|b| b.is_ascii_digit());
        if !well_formed {
            return Err(KernelError::invalid(format!("malformed number {text:?}")));
        }

        let digits = format!("{whole}{fraction}");
        let numer = BigInt::parse_bytes(digits.as_bytes(), 10)
            .ok_or_else(|| KernelError::invalid(format!("malformed number {text:?}")))?;
        let denom = BigInt::from(pow10(fraction.len() as u64)?);
        Ok(Self::reduced(numer, denom))
    }

    /// Normalises sign and common factors. `denom` must be non-zero.
    pub(crate) fn reduced(numer: BigInt, denom: BigInt) -> Self {
        let (numer, denom) = if denom.is_negative() {
            (-numer, -denom)
        } else {
            (numer, denom)
        };
        if numer.is_zero() {
            return Self::zero();
        }
        if denom.is_one() {
            return Self { numer, denom };
        }
        let common = gcd(&numer, &denom);
        Self::divided(numer, denom, &common)
    }

    /// `numer / denom` for parts already known to share no factor.
    /// `denom` must be positive.
    pub(crate) fn from_coprime(numer: BigInt, denom: BigInt) -> Self {
        if numer.is_zero() {
            return Self::zero();
        }
        Self { numer, denom }
    }

    /// [`Self::reduced`], polling `budget` while the common factor is found.
    pub(crate) fn reduced_within(
        numer: BigInt,
        denom: BigInt,
        budget: &Budget,
    ) -> KernelResult<Self> {
        let (numer, denom) = if denom.is_negative() {
            (-numer, -denom)
        } else {
            (numer, denom)
        };
        if numer.is_zero() {
            return Ok(Self::zero());
        }
        if denom.is_one() {
            return Ok(Self { numer, denom });
        }
        let common = gcd_within(&numer, &denom, budget)?;
        Ok(Self::divided(numer, denom, &common))
    }

    fn divided(numer: BigInt, denom: BigInt, common: &BigInt) -> Self {
        if common.is_one() {
            Self { numer, denom }
        } else {
            Self {
                numer: numer / common,
                denom: denom / common,
            }
        }
    }

    /// Numerator in lowest terms (carries the sign).
    #[must_use]
    pub fn numer(&self) -> &BigInt {
        &self.numer
    }

    /// Denominator in lowest terms (always positive).
    #[must_use]
    pub fn denom(&self) -> &BigInt {
        &self.denom
    }

    /// True for zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.numer.is_zero()
    }

    /// True for values below zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.numer.is_negative()
    }

    /// True for whole numbers.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        self.denom.is_one()
    }

    /// True for exactly one.
    #[must_use]
    pub fn is_one(&self) -> bool {
        self.denom.is_one() && self.numer.is_one()
    }

    /// Absolute value.
    #[must_use]
    pub fn abs(&self) -> Self {
        Self {
            numer: self.numer.abs(),
            denom: self.denom.clone(),
        }
    }

    /// `1 / self`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::DivideByZero`] for zero.
    pub fn recip(&self) -> KernelResult<Self> {
        if self.is_zero() {
            return Err(KernelError::DivideByZero);
        }
        let sign = if self.is_negative() { -1 } else { 1 };
        Ok(Self {
            numer: &self.denom * sign,
            denom: self.numer.abs(),
        })
    }

    /// Rounds to the nearest integer, ties to even.
    #[must_use]
    pub fn to_integer_half_even(&self) -> BigInt {
        if self.denom.is_one() {
            return self.numer.clone();
        }
        div_round_half_even(&self.numer, &self.denom)
    }

    /// Largest integer not above the value.
    #[must_use]
    pub fn floor(&self) -> BigInt {
        self.numer.div_floor(&self.denom)
    }

    /// The value as a `u64`, when it is a whole number in range.
    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        if self.is_integer() {
            self.numer.to_u64()
        } else {
            None
        }
    }

    /// Rounds to `digits` places after the point, ties to even.
    #[must_use]
    pub fn round_to_fraction(&self, digits: u32) -> Self {
        let scale = BigInt::from(ten_pow(u64::from(digits)));
        let quantized = div_round_half_even(&(&self.numer * &scale), &self.denom);
        Self::reduced(quantized, scale)
    }

    /// `log10(|self|)` as a float. Only used for size estimates.
    pub(crate) fn log10_abs(&self) -> f64 {
        if self.is_zero() {
            return f64::NEG_INFINITY;
        }
        log10_biguint(self.numer.magnitude()) - log10_biguint(self.denom.magnitude())
    }

    /// The value as a float. Only used for size estimates.
    pub(crate) fn approx_f64(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        let magnitude = 10f64.powf(self.log10_abs());
        if self.is_negative() {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Roughly how many digits the integer part has (at least one).
    #[must_use]
    pub fn integer_digits(&self) -> u64 {
        let log = self.log10_abs();
        if log.is_finite() && log >= 0.0 {
            log.floor() as u64 + 1
        } else {
            1
        }
    }

    /// Splits the denominator as `2^twos · 5^fives · rest`.
    fn denominator_factors(&self) -> (u64, u64, BigUint) {
        let denom = self.denom.magnitude();
        let twos = denom.trailing_zeros().unwrap_or(0);
        let mut rest = denom >> twos;
        let mut fives = 0u64;
        let five = BigUint::from(5u32);
        while !rest.is_zero() && (&rest % &five).is_zero() {
            rest /= &five;
            fives += 1;
        }
        (twos, fives, rest)
    }

    /// True when the decimal expansion is finite.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.denominator_factors().2.is_one()
    }

    /// Exact expansion of a terminating value.
    fn expand(&self, places: u64) -> String {
        let scale = BigInt::from(ten_pow(places));
        let scaled = (&self.numer * scale) / &self.denom;
        let mut digits = scaled.magnitude().to_str_radix(10);
        let places = places as usize;
        if places > 0 {
            if digits.len() <= places {
                digits = format!("{}{digits}", "0".repeat(places + 1 - digits.len()));
            }
            digits.insert(digits.len() - places, '.');
        }
        if scaled.sign() == Sign::Minus {
            digits.insert(0, '-');
        }
        digits
    }
}

impl Default for ExactDecimal {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u64> for ExactDecimal {
    fn from(value: u64) -> Self {
        Self::from_integer(value)
    }
}

impl From<i64> for ExactDecimal {
    fn from(value: i64) -> Self {
        Self::from_integer(value)
    }
}

impl From<BigInt> for ExactDecimal {
    fn from(value: BigInt) -> Self {
        Self::from_integer(value)
    }
}

impl Neg for ExactDecimal {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            numer: -self.numer,
            denom: self.denom,
        }
    }
}

impl Neg for &ExactDecimal {
    type Output = ExactDecimal;

    fn neg(self) -> Self::Output {
        -self.clone()
    }
}

impl Ord for ExactDecimal {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.denom == other.denom {
            return self.numer.cmp(&other.numer);
        }
        (&self.numer * &other.denom).cmp(&(&other.numer * &self.denom))
    }
}

impl PartialOrd for ExactDecimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ExactDecimal {
    /// Plain positional notation. Values without a finite expansion are cut
    /// after twenty places and marked with `…`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom.is_one() {
            return write!(f, "{}", self.numer);
        }
        let (twos, fives, rest) = self.denominator_factors();
        if rest.is_one() {
            write!(f, "{}", self.expand(twos.max(fives)))
        } else {
            let cut = self.round_to_fraction(DISPLAY_REPEATING_DIGITS);
            let places = u64::from(DISPLAY_REPEATING_DIGITS);
            write!(f, "{}…", cut.expand(places))
        }
    }
}

impl fmt::Debug for ExactDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom.is_one() {
            write!(f, "ExactDecimal({})", self.numer)
        } else {
            write!(f, "ExactDecimal({}/{})", self.numer, self.denom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(text: &str) -> ExactDecimal {
        ExactDecimal::parse_literal(text).unwrap()
    }

    #[test]
    fn test_gcd_against_small_operands() {
        let big = BigInt::from(3u32).pow(200_000);
        assert_eq!(gcd(&big, &BigInt::from(2)), BigInt::one());
        assert_eq!(gcd(&big, &BigInt::from(-1)), BigInt::one());
        assert_eq!(gcd(&(&big * 10u32), &BigInt::from(ten_pow(20))), BigInt::from(10));
        assert_eq!(gcd(&BigInt::zero(), &BigInt::from(7)), BigInt::from(7));
        assert_eq!(gcd(&BigInt::from(84), &BigInt::from(-36)), BigInt::from(12));
    }

    #[test]
    fn test_gcd_of_similar_sizes() {
        let a = BigInt::from(6u32).pow(3_000);
        let b = BigInt::from(10u32).pow(2_000);
        assert_eq!(gcd(&a, &b), BigInt::from(2u32).pow(2_000));
        assert_eq!(gcd_within(&a, &b, &Budget::unlimited()), Ok(BigInt::from(2u32).pow(2_000)));
    }

    #[test]
    fn test_gcd_within_stops_when_cancelled() {
        // Consecutive Fibonacci numbers take the longest remainder chain.
        let (mut a, mut b) = (BigInt::one(), BigInt::one());
        for _ in 0..20_000 {
            let next = &a + &b;
            a = std::mem::replace(&mut b, next);
        }
        let budget = Budget::unlimited();
        budget.cancel();
        assert_eq!(gcd_within(&a, &b, &budget), Err(KernelError::Cancelled));
        assert_eq!(gcd(&a, &b), BigInt::one());
    }

    #[test]
    fn test_exact_nth_root() {
        let budget = Budget::unlimited();
        let cube = BigUint::from(12_345u32).pow(3);
        assert_eq!(
            exact_nth_root_within(&cube, 3, &budget),
            Ok(Some(BigUint::from(12_345u32)))
        );
        assert_eq!(exact_nth_root_within(&(cube + 1u32), 3, &budget), Ok(None));

        let wide = BigUint::from(7u32).pow(5_000);
        assert_eq!(
            exact_nth_root_within(&wide, 2, &budget),
            Ok(Some(BigUint::from(7u32).pow(2_500)))
        );
        assert_eq!(exact_nth_root_within(&(wide * 7u32), 2, &budget), Ok(None));
        assert_eq!(
            exact_nth_root_within(&BigUint::from(1u32 << 30), 30, &budget),
            Ok(Some(BigUint::from(2u32)))
        );
    }

    #[test]
    fn test_root_search_stops_when_cancelled() {
        let budget = Budget::unlimited();
        budget.cancel();
        let square = BigUint::from(3u32).pow(40_000);
        assert_eq!(
            exact_nth_root_within(&square, 2, &budget),
            Err(KernelError::Cancelled)
        );
    }

    #[test]
    fn test_parse_literal_forms() {
        assert_eq!(dec("42"), ExactDecimal::from(42u64));
        assert_eq!(dec("1.50"), ExactDecimal::from_ratio(3.into(), 2.into()).unwrap());
        assert_eq!(dec(".5"), dec("0.5"));
        assert_eq!(dec("5."), dec("5"));
        assert!(ExactDecimal::parse_literal(".").is_err());
        assert!(ExactDecimal::parse_literal("1.2.3").is_err());
        assert!(ExactDecimal::parse_literal("").is_err());
    }

    #[test]
    fn test_half_even_rounding() {
        assert_eq!(dec("2.5").to_integer_half_even(), BigInt::from(2));
        assert_eq!(dec("3.5").to_integer_half_even(), BigInt::from(4));
        assert_eq!((-dec("2.5")).to_integer_half_even(), BigInt::from(-2));
        assert_eq!((-dec("3.5")).to_integer_half_even(), BigInt::from(-4));
        assert_eq!(dec("2.4999").to_integer_half_even(), BigInt::from(2));
        assert_eq!(dec("2.5001").to_integer_half_even(), BigInt::from(3));
    }

    #[test]
    fn test_round_to_fraction() {
        let third = ExactDecimal::from_ratio(1.into(), 3.into()).unwrap();
        assert_eq!(third.round_to_fraction(3), dec("0.333"));
        let two_thirds = ExactDecimal::from_ratio(2.into(), 3.into()).unwrap();
        assert_eq!(two_thirds.round_to_fraction(2), dec("0.67"));
    }

    #[test]
    fn test_display() {
        assert_eq!(dec("0.25").to_string(), "0.25");
        assert_eq!(dec("-0.05").to_string(), "-0.05");
        assert_eq!(dec("1200").to_string(), "1200");
        assert_eq!(dec("3.1400").to_string(), "3.14");
        let third = ExactDecimal::from_ratio(1.into(), 3.into()).unwrap();
        assert_eq!(third.to_string(), "0.33333333333333333333…");
    }

    #[test]
    fn test_ordering() {
        assert!(dec("0.3") > dec("0.29"));
        assert!(-dec("1") < ExactDecimal::zero());
        let third = ExactDecimal::from_ratio(1.into(), 3.into()).unwrap();
        assert!(third < dec("0.3334"));
        assert!(third > dec("0.3333"));
    }

    #[test]
    fn test_digit_count() {
        assert_eq!(digit_count(&BigUint::zero()), 1);
        assert_eq!(digit_count(&BigUint::from(9u32)), 1);
        assert_eq!(digit_count(&BigUint::from(10u32)), 2);
        assert_eq!(digit_count(&ten_pow(100)), 101);
        assert_eq!(digit_count(&(ten_pow(100) - 1u32)), 100);
    }

    #[test]
    fn test_exceeds_digits() {
        assert!(!exceeds_digits(&ten_pow(63), 64));
        assert!(exceeds_digits(&ten_pow(64), 64));
    }

    #[test]
    fn test_to_u64() {
        assert_eq!(dec("17").to_u64(), Some(17));
        assert_eq!(dec("17.5").to_u64(), None);
        assert_eq!((-dec("1")).to_u64(), None);
    }

    #[test]
    fn test_recip() {
        assert_eq!(dec("4").recip().unwrap(), dec("0.25"));
        assert_eq!((-dec("0.5")).recip().unwrap(), -dec("2"));
        assert_eq!(ExactDecimal::zero().recip(), Err(KernelError::DivideByZero));
    }
}
