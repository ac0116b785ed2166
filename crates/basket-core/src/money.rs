//! # Money Module
//!
//! Provides the `Money` and `Weight` types for monetary and scale values.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  At a deli counter:                                                     │
//! │    $5.99/lb × 1.37 lb = 8.2063  → which cent is charged?               │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents + Integer Milli-units                      │
//! │    599 cents × 1370 milli / 1000 = 820.63 → 821 cents                  │
//! │    Rounding happens ONCE, in ONE place, identically on both sides      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Rule
//! Every fractional cent is rounded half AWAY from zero. A sale of $8.205
//! becomes $8.21 and its refund becomes -$8.21, so a refund always mirrors
//! the sale it reverses.
//!
//! ## Usage
//! ```rust
//! use basket_core::money::{Money, Weight};
//!
//! let price = Money::from_cents(599);         // $5.99 per lb
//! let weight = Weight::from_milli(1370);      // 1.370 lb
//! assert_eq!(price.multiply_weight(weight).cents(), 821);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::TaxRate;
use crate::validation::ValidationResult;

/// Divides `numerator` by `denominator`, rounding half away from zero.
///
/// `denominator` must be positive.
fn div_round_half_away(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

/// Narrows a widened amount back to cents.
fn narrow(field: &str, cents: i128) -> ValidationResult<i64> {
    i64::try_from(cents).map_err(|_| ValidationError::OutOfRange {
        field: field.to_string(),
        min: i64::MIN,
        max: i64::MAX,
    })
}

/// Narrows a widened amount, clamping at the i64 range.
fn saturate(cents: i128) -> i64 {
    i64::try_from(cents).unwrap_or(if cents < 0 { i64::MIN } else { i64::MAX })
}

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents for USD).
///
/// ## Design Decisions
/// - **i64 (signed)**: Refund transactions carry negative totals
/// - **Single field tuple struct**: Zero-cost abstraction over i64
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price_cents ──► CartItem ──► line subtotal ──► discount        │
/// │                                              │                          │
/// │                                              ▼                          │
/// │              Cart subtotal − discounts ──► tax ──► total ──► change     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use basket_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-dollar portion, truncated toward zero.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns whole dollars rounded down (toward negative infinity).
    ///
    /// Loyalty points are credited as `floor(total)`.
    ///
    /// ## Example
    /// ```rust
    /// use basket_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1944).floor_dollars(), 19);
    /// assert_eq!(Money::from_cents(-1944).floor_dollars(), -20);
    /// ```
    #[inline]
    pub const fn floor_dollars(&self) -> i64 {
        self.0.div_euclid(100)
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

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Calculates tax on this amount.
    ///
    /// ## Example
    /// ```rust
    /// use basket_core::money::Money;
    /// use basket_core::types::TaxRate;
    ///
    /// let taxable = Money::from_cents(1800); // $18.00
    /// let tax = taxable.calculate_tax(TaxRate::from_bps(800)); // 8%
    /// assert_eq!(tax.cents(), 144);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.percentage(rate.bps())
    }

    /// Returns `bps / 10000` of this amount, rounded half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use basket_core::money::Money;
    ///
    /// let line = Money::from_cents(2000);      // $20.00
    /// assert_eq!(line.percentage(1000).cents(), 200); // 10% = $2.00
    /// ```
    pub fn percentage(&self, bps: u32) -> Money {
        Money(saturate(self.scaled_by(bps as i128, 10_000)))
    }

    fn scaled_by(&self, factor: i128, denominator: i128) -> i128 {
        div_round_half_away(self.0 as i128 * factor, denominator)
    }

    /// Multiplies money by a unit quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Multiplies a per-unit price by a scale weight.
    ///
    /// ## User Workflow
    /// ```text
    /// Product: Sliced Turkey $8.99/lb
    /// Scale reads: 0.750 lb
    ///      │
    ///      ▼
    /// multiply_weight(750 milli) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line Total: $6.74 (674.25 → 674)
    /// ```
    ///
    /// Clamps at the i64 range. Prices and weights that passed validation
    /// never reach it; unvalidated input goes through
    /// [`Money::checked_multiply_weight`].
    pub fn multiply_weight(&self, weight: Weight) -> Money {
        Money(saturate(self.scaled_by(weight.milli() as i128, 1_000)))
    }

    /// Weighed price that fails with `OutOfRange` rather than overflowing.
    ///
    /// ## Example
    /// ```rust
    /// use basket_core::money::{Money, Weight};
    ///
    /// let price = Money::from_cents(2000);
    /// assert!(price.checked_multiply_weight(Weight::from_milli(i64::MAX)).is_err());
    /// ```
    pub fn checked_multiply_weight(&self, weight: Weight) -> ValidationResult<Money> {
        narrow("line total", self.scaled_by(weight.milli() as i128, 1_000)).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.dollars().abs(), self.cents_part())
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Weight Type
// =============================================================================

/// A scale reading in thousandths of the product's selling unit.
///
/// `Weight::from_milli(1250)` is 1.250 lb for a product priced per pound.
/// Always strictly positive once admitted to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Weight(i64);

impl Weight {
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Weight(milli)
    }

    /// Converts a decimal scale reading, rounding to the nearest thousandth.
    ///
    /// Only for scale input; never use floats for money.
    pub fn from_units(units: f64) -> Self {
        Weight((units * 1000.0).round() as i64)
    }

    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}{}.{:03}", sign, abs / 1000, abs % 1000)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
