//! # Denomination Module
//!
//! Cash drawer denomination counts and the calculator that turns them into
//! a drawer total.
//!
//! ## Closed Denomination Set
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Bills:  Q200   Q100   Q50   Q20   Q10   Q5   Q1                    │
//! │  Coins:  Q1     Q0.50  Q0.25 Q0.10 Q0.05                            │
//! │                                                                     │
//! │  Denominations are a closed sum type, not an open string map.       │
//! │  A typo like "0.5" or "quinientos" cannot reach the calculator:     │
//! │  it fails at deserialization, before any math runs.                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Counts remain tolerant: a negative count is coerced to zero and an
//! absent denomination contributes nothing, so a partially-filled drawer
//! form still totals correctly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::money::Money;

// =============================================================================
// Bills
// =============================================================================

/// A quetzal banknote denomination.
///
/// Serializes as its face-value label ("200", "100", ...) so the persisted
/// JSON blob reads like the paper drawer form it replaces.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Bill {
    #[serde(rename = "200")]
    Q200,
    #[serde(rename = "100")]
    Q100,
    #[serde(rename = "50")]
    Q50,
    #[serde(rename = "20")]
    Q20,
    #[serde(rename = "10")]
    Q10,
    #[serde(rename = "5")]
    Q5,
    #[serde(rename = "1")]
    Q1,
}

impl Bill {
    /// Every banknote denomination, largest first.
    pub const ALL: [Bill; 7] = [
        Bill::Q200,
        Bill::Q100,
        Bill::Q50,
        Bill::Q20,
        Bill::Q10,
        Bill::Q5,
        Bill::Q1,
    ];

    /// Face value of the banknote.
    #[inline]
    pub const fn face_value(self) -> Money {
        match self {
            Bill::Q200 => Money::from_centavos(20_000),
            Bill::Q100 => Money::from_centavos(10_000),
            Bill::Q50 => Money::from_centavos(5_000),
            Bill::Q20 => Money::from_centavos(2_000),
            Bill::Q10 => Money::from_centavos(1_000),
            Bill::Q5 => Money::from_centavos(500),
            Bill::Q1 => Money::from_centavos(100),
        }
    }
}

impl fmt::Display for Bill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.face_value().quetzales())
    }
}

// =============================================================================
// Coins
// =============================================================================

/// A quetzal coin denomination.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Coin {
    #[serde(rename = "1")]
    Q1,
    #[serde(rename = "0.50")]
    C50,
    #[serde(rename = "0.25")]
    C25,
    #[serde(rename = "0.10")]
    C10,
    #[serde(rename = "0.05")]
    C5,
}

impl Coin {
    /// Every coin denomination, largest first.
    pub const ALL: [Coin; 5] = [Coin::Q1, Coin::C50, Coin::C25, Coin::C10, Coin::C5];

    /// Face value of the coin.
    #[inline]
    pub const fn face_value(self) -> Money {
        match self {
            Coin::Q1 => Money::from_centavos(100),
            Coin::C50 => Money::from_centavos(50),
            Coin::C25 => Money::from_centavos(25),
            Coin::C10 => Money::from_centavos(10),
            Coin::C5 => Money::from_centavos(5),
        }
    }
}

// =============================================================================
// Cash Breakdown
// =============================================================================

/// A counted cash drawer: how many of each bill and coin.
///
/// This is what gets captured at shift open and shift close, and what the
/// shift row persists as its denomination JSON blobs.
///
/// ## Example
/// ```rust
/// use hidrocolon_core::denomination::{Bill, CashBreakdown, Coin};
///
/// // 5 x Q100 bills + 10 x Q1 coins = Q510.00
/// let drawer = CashBreakdown::new()
///     .with_bill(Bill::Q100, 5)
///     .with_coin(Coin::Q1, 10);
/// assert_eq!(drawer.total().centavos(), 51_000);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashBreakdown {
    /// Banknote counts, keyed by denomination.
    #[serde(default)]
    pub bills: BTreeMap<Bill, i64>,

    /// Coin counts, keyed by denomination.
    #[serde(default)]
    pub coins: BTreeMap<Coin, i64>,
}

impl CashBreakdown {
    /// Creates an empty breakdown (a freshly emptied drawer).
    pub fn new() -> Self {
        CashBreakdown::default()
    }

    /// Sets the count for a banknote denomination (builder style).
    pub fn with_bill(mut self, bill: Bill, count: i64) -> Self {
        self.bills.insert(bill, count);
        self
    }

    /// Sets the count for a coin denomination (builder style).
    pub fn with_coin(mut self, coin: Coin, count: i64) -> Self {
        self.coins.insert(coin, count);
        self
    }

    /// Checks whether no denomination has a positive count.
    pub fn is_empty(&self) -> bool {
        self.bills.values().all(|c| *c <= 0) && self.coins.values().all(|c| *c <= 0)
    }

    /// Sums the drawer: Σ count × face value across bills and coins.
    ///
    /// ## Tolerance Rules
    /// - Absent denominations contribute zero
    /// - Negative counts are coerced to zero
    /// - An empty breakdown totals Q0.00
    ///
    /// Accumulates in i128 so an absurd count cannot overflow on the way
    /// to being rejected by validation upstream.
    pub fn total(&self) -> Money {
        let bills: i128 = self
            .bills
            .iter()
            .map(|(bill, count)| (*count).max(0) as i128 * bill.face_value().centavos() as i128)
            .sum();
        let coins: i128 = self
            .coins
            .iter()
            .map(|(coin, count)| (*count).max(0) as i128 * coin.face_value().centavos() as i128)
            .sum();
        Money::from_centavos((bills + coins) as i64)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_values() {
        assert_eq!(Bill::Q200.face_value().centavos(), 20_000);
        assert_eq!(Bill::Q1.face_value().centavos(), 100);
        assert_eq!(Coin::Q1.face_value().centavos(), 100);
        assert_eq!(Coin::C5.face_value().centavos(), 5);
    }

    #[test]
    fn test_empty_breakdown_totals_zero() {
        let drawer = CashBreakdown::new();
        assert!(drawer.is_empty());
        assert_eq!(drawer.total(), Money::zero());
    }

    #[test]
    fn test_total_sums_all_denominations() {
        let drawer = CashBreakdown::new()
            .with_bill(Bill::Q200, 2) // 400.00
            .with_bill(Bill::Q50, 3) // 150.00
            .with_coin(Coin::C25, 4) // 1.00
            .with_coin(Coin::C5, 1); // 0.05
        assert_eq!(drawer.total().centavos(), 55_105);
    }

    #[test]
    fn test_zero_counts_contribute_nothing() {
        let drawer = CashBreakdown::new()
            .with_bill(Bill::Q100, 0)
            .with_coin(Coin::C50, 0);
        assert_eq!(drawer.total(), Money::zero());
        assert!(drawer.is_empty());
    }

    #[test]
    fn test_negative_counts_coerced_to_zero() {
        let drawer = CashBreakdown::new()
            .with_bill(Bill::Q100, -7)
            .with_bill(Bill::Q20, 1);
        assert_eq!(drawer.total().centavos(), 2_000);
    }

    #[test]
    fn test_opening_drawer_scenario() {
        // 5 x Q100 + 10 x Q1 coins = Q510.00
        let drawer = CashBreakdown::new()
            .with_bill(Bill::Q100, 5)
            .with_coin(Coin::Q1, 10);
        assert_eq!(drawer.total().centavos(), 51_000);
    }

    #[test]
    fn test_json_round_trip_uses_face_labels() {
        let drawer = CashBreakdown::new()
            .with_bill(Bill::Q200, 1)
            .with_coin(Coin::C50, 2);

        let json = serde_json::to_string(&drawer).unwrap();
        assert!(json.contains("\"200\":1"));
        assert!(json.contains("\"0.50\":2"));

        let parsed: CashBreakdown = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, drawer);
    }

    #[test]
    fn test_unknown_denomination_key_is_rejected() {
        // The closed enum refuses keys outside the denomination set, so a
        // malformed count fails loudly instead of silently dropping money.
        let json = r#"{"bills":{"500":3},"coins":{}}"#;
        assert!(serde_json::from_str::<CashBreakdown>(json).is_err());
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let parsed: CashBreakdown = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.total(), Money::zero());
    }
}
