//! # Money Module
//!
//! Integer money, basis-point rates and the single rounding rule used by order
//! totals.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │    25.00 × 0.14 = 3.5000000000000004                                    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents + Basis Points                             │
//! │    2500 cents × 1400 bps = 3_500_000 (exact, scale 1/10000 cent)        │
//! │    Rounded once, at the total, half to even                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bistro_core::money::{Money, Rate};
//!
//! let subtotal = Money::from_cents(2500);      // 25.00
//! let tax = subtotal.apply_rate(Rate::from_bps(1400));
//! assert_eq!(tax.round_half_even().cents(), 350);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// Number of exact units per cent (one basis point of a cent).
const EXACT_SCALE: i128 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents / piastres).
///
/// ## Design Decisions
/// - **i64 (signed)**: deltas and discounts can be negative during arithmetic
/// - **Single field tuple struct**: zero-cost wrapper over i64
/// - **Serialized as a plain integer** so clients never see floats
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ```rust
    /// use bistro_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 50).cents(), 1050);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity, saturating at the `i64` bounds.
    ///
    /// Use [`Money::checked_mul_quantity`] where overflow must be reported.
    ///
    /// ```rust
    /// use bistro_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1000).multiply_quantity(2).cents(), 2000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// `None` on overflow.
    ///
    /// ```rust
    /// use bistro_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(250).checked_mul_quantity(4), Some(Money::from_cents(1000)));
    /// assert_eq!(Money::from_cents(i64::MAX / 2).checked_mul_quantity(3), None);
    /// ```
    #[inline]
    pub const fn checked_mul_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Returns the larger of `self` and zero.
    #[inline]
    pub fn floor_zero(self) -> Self {
        if self.0 < 0 {
            Money::zero()
        } else {
            self
        }
    }

    /// Applies a rate without rounding.
    ///
    /// The result keeps four extra decimal places so several rated amounts
    /// can be summed before the one rounding step.
    pub fn apply_rate(&self, rate: Rate) -> ExactAmount {
        ExactAmount(self.0 as i128 * rate.bps() as i128)
    }

    /// Lifts this value into exact arithmetic.
    #[inline]
    pub fn exact(&self) -> ExactAmount {
        ExactAmount(self.0 as i128 * EXACT_SCALE)
    }
}

/// Formats as `12.50`. Currency symbols are a client concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Exact Amount
// =============================================================================

/// An unrounded amount in 1/10000 of a cent.
///
/// Produced by [`Money::apply_rate`]; turned back into [`Money`] only through
/// [`ExactAmount::round_half_even`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ExactAmount(i128);

impl ExactAmount {
    /// Raw value in 1/10000 cent.
    #[inline]
    pub const fn raw(&self) -> i128 {
        self.0
    }

    /// Rounds to whole cents, ties to the even cent (bankers rounding).
    ///
    /// ## Bankers Rounding
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  0.5 → 0    1.5 → 2    2.5 → 2    3.5 → 4    -2.5 → -2             │
    /// │  Ties alternate direction, so no systematic drift across orders     │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// Saturates at the `i64` bounds; see [`ExactAmount::checked_round_half_even`].
    pub fn round_half_even(&self) -> Money {
        let cents = self.rounded_cents().clamp(i64::MIN as i128, i64::MAX as i128);
        Money::from_cents(cents as i64)
    }

    /// Rounds like [`ExactAmount::round_half_even`], or `None` when the
    /// result does not fit in `i64` cents.
    pub fn checked_round_half_even(&self) -> Option<Money> {
        i64::try_from(self.rounded_cents()).ok().map(Money::from_cents)
    }

    fn rounded_cents(&self) -> i128 {
        let quotient = self.0.div_euclid(EXACT_SCALE);
        let remainder = self.0.rem_euclid(EXACT_SCALE);

        match (remainder * 2).cmp(&EXACT_SCALE) {
            Ordering::Less => quotient,
            Ordering::Greater => quotient + 1,
            Ordering::Equal if quotient % 2 == 0 => quotient,
            Ordering::Equal => quotient + 1,
        }
    }
}

impl Add for ExactAmount {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        ExactAmount(self.0 + other.0)
    }
}

impl Sub for ExactAmount {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        ExactAmount(self.0 - other.0)
    }
}

// =============================================================================
// Rate
// =============================================================================

/// A proportional rate in basis points (1 bps = 0.01%).
///
/// Used for both the tax rate and the service charge rate.
/// 1400 bps = 0.14 = 14%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// Upper bound: 100%.
    pub const MAX_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a fraction such as `0.14`.
    ///
    /// Only for configuration input; the fraction is converted once and never
    /// used in arithmetic.
    pub fn from_fraction(fraction: f64) -> Self {
        Rate((fraction * 10_000.0).round().max(0.0) as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// The rate as a fraction (display only).
    #[inline]
    pub fn as_fraction(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(3100).to_string(), "31.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!(vec![a, b, b].into_iter().sum::<Money>().cents(), 2000);
    }

    #[test]
    fn test_quantity_overflow() {
        let huge = Money::from_cents(i64::MAX / 2);

        assert_eq!(huge.checked_mul_quantity(3), None);
        assert_eq!(huge.multiply_quantity(3).cents(), i64::MAX);
        assert_eq!(huge.checked_add(huge), Some(Money::from_cents(i64::MAX - 1)));
        assert_eq!(huge.checked_add(Money::from_cents(i64::MAX)), None);

        // Fits as a subtotal, not once 14% tax is added.
        let subtotal = Money::from_cents(i64::MAX - 1);
        let gross = subtotal.exact() + subtotal.apply_rate(Rate::from_bps(1400));
        assert_eq!(gross.checked_round_half_even(), None);
        assert_eq!(gross.round_half_even().cents(), i64::MAX);
        assert_eq!(
            Money::from_cents(2500).exact().checked_round_half_even(),
            Some(Money::from_cents(2500))
        );
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!(Money::from_cents(-1).floor_zero(), Money::zero());
        assert_eq!(Money::from_cents(7).floor_zero().cents(), 7);
    }

    #[test]
    fn test_apply_rate_is_exact() {
        let tax = Money::from_cents(2500).apply_rate(Rate::from_bps(1400));
        assert_eq!(tax.raw(), 3_500_000);
        assert_eq!(tax.round_half_even().cents(), 350);
    }

    #[test]
    fn test_round_half_even_ties() {
        let half = |cents_x10: i128| ExactAmount(cents_x10 * 1_000).round_half_even().cents();

        assert_eq!(half(5), 0); // 0.5 cent
        assert_eq!(half(15), 2); // 1.5 cents
        assert_eq!(half(25), 2); // 2.5 cents
        assert_eq!(half(35), 4); // 3.5 cents
        assert_eq!(half(-25), -2);
    }

    #[test]
    fn test_round_half_even_non_ties() {
        assert_eq!(ExactAmount(14_999).round_half_even().cents(), 1);
        assert_eq!(ExactAmount(15_001).round_half_even().cents(), 2);
        assert_eq!(ExactAmount(-14_999).round_half_even().cents(), -1);
    }

    #[test]
    fn test_rate_from_fraction() {
        assert_eq!(Rate::from_fraction(0.14).bps(), 1400);
        assert_eq!(Rate::from_fraction(0.10).bps(), 1000);
        assert_eq!(Rate::from_fraction(0.0825).bps(), 825);
        assert_eq!(Rate::from_fraction(-1.0).bps(), 0);
    }

    #[test]
    fn test_money_serializes_as_integer() {
        let json = serde_json::to_string(&Money::from_cents(3100)).unwrap();
        assert_eq!(json, "3100");
    }
}
