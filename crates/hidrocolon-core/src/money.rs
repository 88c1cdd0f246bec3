//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                         │
//! │                                                                     │
//! │  In floating point:                                                 │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                       │
//! │                                                                     │
//! │  A cash reconciliation built on f64 drifts by fractions of a        │
//! │  centavo and then trips the Q0.50 authorization gate on phantom     │
//! │  variances.                                                         │
//! │                                                                     │
//! │  OUR SOLUTION: Integer Centavos                                     │
//! │    Q10.99 = 1099 centavos, always exact                             │
//! │    Rate application rounds half-up ONCE, to a whole centavo         │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use hidrocolon_core::money::Money;
//!
//! // Create from centavos (preferred)
//! let price = Money::from_centavos(1099); // Q10.99
//!
//! // Arithmetic operations
//! let total = price + Money::from_centavos(500); // Q15.99
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::types::Rate;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in centavos (hundredths of a quetzal).
///
/// ## Design Decisions
/// - **i64 (signed)**: variances are differences and go negative (missing cash)
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Derives**: full serde support for JSON serialization
///
/// ## Where Money Flows
/// ```text
/// Denomination counts ──► opening / closing cash totals
/// Sale tenders        ──► per-method sales totals
/// Rates               ──► tax and card-commission withholdings
/// All of the above    ──► reconciliation figures on shift close
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from centavos (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use hidrocolon_core::money::Money;
    ///
    /// let price = Money::from_centavos(1099); // Q10.99
    /// assert_eq!(price.centavos(), 1099);
    /// ```
    #[inline]
    pub const fn from_centavos(centavos: i64) -> Self {
        Money(centavos)
    }

    /// Creates a Money value from whole quetzales.
    ///
    /// ## Example
    /// ```rust
    /// use hidrocolon_core::money::Money;
    ///
    /// assert_eq!(Money::from_quetzales(200).centavos(), 20_000);
    /// ```
    #[inline]
    pub const fn from_quetzales(quetzales: i64) -> Self {
        Money(quetzales * 100)
    }

    /// Returns the value in centavos.
    #[inline]
    pub const fn centavos(&self) -> i64 {
        self.0
    }

    /// Returns the whole-quetzal portion.
    #[inline]
    pub const fn quetzales(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the centavo portion (always 0-99).
    #[inline]
    pub const fn centavos_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    ///
    /// ## Example
    /// ```rust
    /// use hidrocolon_core::money::Money;
    ///
    /// let shortage = Money::from_centavos(-550);
    /// assert_eq!(shortage.abs().centavos(), 550);
    /// ```
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Applies a rate and returns the resulting amount, rounded half-up
    /// to the nearest centavo.
    ///
    /// ## Implementation
    /// Integer math in i128: `(amount * bps + 5000) / 10000`.
    /// The +5000 provides half-up rounding (5000/10000 = 0.5), and i128
    /// prevents overflow on large amounts.
    ///
    /// This is the single place rounding happens. Intermediate figures
    /// are never rounded again downstream.
    ///
    /// ## Example
    /// ```rust
    /// use hidrocolon_core::money::Money;
    /// use hidrocolon_core::types::Rate;
    ///
    /// let card_sales = Money::from_centavos(100_000); // Q1000.00
    /// let tax = card_sales.apply_rate(Rate::from_bps(1600)); // 16%
    /// assert_eq!(tax.centavos(), 16_000); // Q160.00
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let amount = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_centavos(amount as i64)
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use hidrocolon_core::money::Money;
    ///
    /// let unit_price = Money::from_centavos(2500); // Q25.00
    /// assert_eq!(unit_price.multiply_quantity(3).centavos(), 7500);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and debugging. Receipt formatting is a presentation
/// concern and lives outside this crate.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}Q{}.{:02}",
            sign,
            self.quetzales().abs(),
            self.centavos_part()
        )
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Negation (for flipping a variance sign).
impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by integer (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Summation over iterators of Money.
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_centavos() {
        let money = Money::from_centavos(1099);
        assert_eq!(money.centavos(), 1099);
        assert_eq!(money.quetzales(), 10);
        assert_eq!(money.centavos_part(), 99);
    }

    #[test]
    fn test_from_quetzales() {
        assert_eq!(Money::from_quetzales(510).centavos(), 51_000);
        assert_eq!(Money::from_quetzales(-5).centavos(), -500);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_centavos(1099)), "Q10.99");
        assert_eq!(format!("{}", Money::from_centavos(500)), "Q5.00");
        assert_eq!(format!("{}", Money::from_centavos(-550)), "-Q5.50");
        assert_eq!(format!("{}", Money::from_centavos(0)), "Q0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_centavos(1000);
        let b = Money::from_centavos(500);

        assert_eq!((a + b).centavos(), 1500);
        assert_eq!((a - b).centavos(), 500);
        assert_eq!((-a).centavos(), -1000);
        assert_eq!((a * 3).centavos(), 3000);
    }

    #[test]
    fn test_apply_rate_basic() {
        // Q10.00 at 16% = Q1.60
        let amount = Money::from_centavos(1000);
        let tax = amount.apply_rate(Rate::from_bps(1600));
        assert_eq!(tax.centavos(), 160);
    }

    #[test]
    fn test_apply_rate_with_rounding() {
        // Q0.99 at 16% = 15.84 centavos, rounds half-up to 16
        let amount = Money::from_centavos(99);
        let tax = amount.apply_rate(Rate::from_bps(1600));
        assert_eq!(tax.centavos(), 16);

        // Q0.03 at 16% = 0.48 centavos, rounds down to 0
        let tiny = Money::from_centavos(3);
        assert_eq!(tiny.apply_rate(Rate::from_bps(1600)).centavos(), 0);
    }

    #[test]
    fn test_apply_rate_large_amount_no_overflow() {
        // A year of clinic revenue should not overflow the intermediate math
        let amount = Money::from_centavos(i64::MAX / 20_000);
        let result = amount.apply_rate(Rate::from_bps(1600));
        assert!(result.is_positive());
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let positive = Money::from_centavos(100);
        assert!(positive.is_positive());

        let negative = Money::from_centavos(-100);
        assert!(negative.is_negative());
    }

    #[test]
    fn test_sum_iterator() {
        let parts = [
            Money::from_centavos(100),
            Money::from_centavos(250),
            Money::from_centavos(-50),
        ];
        let total: Money = parts.into_iter().sum();
        assert_eq!(total.centavos(), 300);
    }

    #[test]
    fn test_multiply_quantity() {
        let unit_price = Money::from_centavos(299);
        assert_eq!(unit_price.multiply_quantity(3).centavos(), 897);
    }
}
