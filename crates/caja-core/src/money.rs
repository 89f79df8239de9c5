//! # Money Module
//!
//! Exact base-10 fixed-point arithmetic for every monetary calculation.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                     │
//! │                                                                 │
//! │  In binary floating point:                                      │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                   │
//! │                                                                 │
//! │  OUR SOLUTION: Integer Cents + Integer Basis Points             │
//! │    Money   = i64 cents       ($107.10  → 10710)                 │
//! │    TaxRate = i64 basis points (19%     → 1900)                  │
//! │    Rounding happens exactly once, when a derived amount is      │
//! │    produced, never silently mid-calculation.                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use crate::error::CoreError;

/// Scale of a full rate: 10000 basis points = 100%.
const BPS_SCALE: i128 = 10_000;

// =============================================================================
// Money
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: negative values exist transiently (refund math),
///   persisted sale amounts are validated non-negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - Rate application (`percent_of`, `calculate_tax`) rounds half-up at
///   cent resolution; addition/subtraction/quantity multiplication are exact
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value, rejecting negative amounts.
    ///
    /// Used at input boundaries (amount paid, unit cost) where a negative
    /// amount is never meaningful.
    pub fn non_negative(field: &'static str, cents: i64) -> Result<Self, CoreError> {
        if cents < 0 {
            return Err(CoreError::InvalidAmount { field, cents });
        }
        Ok(Money(cents))
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity. Exact, no rounding involved.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns the given fraction of this amount, rounded half-up to cents.
    ///
    /// `bps` is the fraction in basis points: 1000 = 10%.
    /// i128 intermediates prevent overflow on large amounts.
    pub fn percent_of(&self, bps: i64) -> Money {
        let cents = (self.0 as i128 * bps as i128 + BPS_SCALE / 2) / BPS_SCALE;
        Money(cents as i64)
    }

    /// Calculates tax on this (already discounted) amount.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::{Money, TaxRate};
    ///
    /// let net = Money::from_cents(9000);           // $90.00
    /// let tax = net.calculate_tax(TaxRate::from_bps(1900)); // 19%
    /// assert_eq!(tax.cents(), 1710);               // $17.10
    /// ```
    #[inline]
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.percent_of(rate.bps())
    }

    /// Change due to the customer: `max(0, paid - total)`.
    pub fn change_due(total: Money, paid: Money) -> Money {
        Money((paid.0 - total.0).max(0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
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

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 1900 bps = 19%.
/// Four decimal places of rate precision with no floating point anywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(i64);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: i64) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a fraction (0.19 = 19%), for configuration input.
    pub fn from_fraction(fraction: f64) -> Self {
        TaxRate((fraction * BPS_SCALE as f64).round() as i64)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Discount Rate
// =============================================================================

/// A discount percentage in basis points, always within [0%, 100%].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRate(i64);

impl DiscountRate {
    /// Creates a discount from a percentage, clamped to [0, 100].
    pub fn from_percent_clamped(percent: f64) -> Self {
        let bps = (percent * 100.0).round() as i64;
        DiscountRate(bps.clamp(0, BPS_SCALE as i64))
    }

    /// Whether a percentage is representable without clamping.
    pub fn percent_in_range(percent: f64) -> bool {
        (0.0..=100.0).contains(&percent)
    }

    /// Returns the discount in basis points.
    #[inline]
    pub const fn bps(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The discount this rate takes off the given amount, rounded to cents.
    #[inline]
    pub fn amount_off(&self, amount: Money) -> Money {
        amount.percent_of(self.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_cents_roundtrip() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
    }

    #[test]
    fn non_negative_rejects_negative() {
        assert!(Money::non_negative("amount_paid", -1).is_err());
        assert_eq!(Money::non_negative("amount_paid", 0).unwrap(), Money::zero());
    }

    #[test]
    fn display_format() {
        assert_eq!(format!("{}", Money::from_cents(10710)), "$107.10");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn arithmetic_is_exact() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);
        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.multiply_quantity(3).cents(), 3000);
    }

    #[test]
    fn tax_is_computed_at_bps_precision() {
        // $10.00 at 8.25% = $0.825 -> rounds half-up to $0.83
        let amount = Money::from_cents(1000);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(825)).cents(), 83);
        // $90.00 at 19% = $17.10 exactly
        assert_eq!(Money::from_cents(9000).calculate_tax(TaxRate::from_bps(1900)).cents(), 1710);
    }

    #[test]
    fn tax_rate_from_fraction() {
        assert_eq!(TaxRate::from_fraction(0.19).bps(), 1900);
        assert_eq!(TaxRate::from_fraction(0.0825).bps(), 825);
    }

    #[test]
    fn discount_clamps_to_valid_range() {
        assert_eq!(DiscountRate::from_percent_clamped(10.0).bps(), 1000);
        assert_eq!(DiscountRate::from_percent_clamped(-5.0).bps(), 0);
        assert_eq!(DiscountRate::from_percent_clamped(150.0).bps(), 10_000);
        assert!(DiscountRate::percent_in_range(100.0));
        assert!(!DiscountRate::percent_in_range(100.01));
    }

    #[test]
    fn discount_amount_off() {
        let subtotal = Money::from_cents(10_000); // $100.00
        let off = DiscountRate::from_percent_clamped(10.0).amount_off(subtotal);
        assert_eq!(off.cents(), 1000); // $10.00
    }

    #[test]
    fn change_due_never_negative() {
        let total = Money::from_cents(10710);
        assert_eq!(Money::change_due(total, Money::from_cents(11000)).cents(), 290);
        assert_eq!(Money::change_due(total, Money::from_cents(10710)).cents(), 0);
        assert_eq!(Money::change_due(total, Money::from_cents(10000)).cents(), 0);
    }
}
