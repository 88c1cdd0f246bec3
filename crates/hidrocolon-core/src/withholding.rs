//! # Withholding Module
//!
//! Tax and bank-commission withholding over a shift's sales, split by
//! payment method.
//!
//! ## The Card Double-Deduction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Cash / Transfer / Deposit:   tax = 16% of the bucket               │
//! │                                                                     │
//! │  Card settles through the bank, which takes its cut first:          │
//! │                                                                     │
//! │    card total C                                                     │
//! │         │                                                           │
//! │         ├── bank commission = 6% of C          (0.06 C)             │
//! │         │                                                           │
//! │         └── tax = 16% of (C − commission)      (0.1504 C)           │
//! │                                                                     │
//! │    total card withholding = commission + tax   (0.2104 C)           │
//! │                                                                     │
//! │  Example: C = Q1000.00 → commission Q60.00, tax Q150.40,            │
//! │           total withheld Q210.40                                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rates are fixed statutory/contractual constants; see [`crate::TAX_RATE`]
//! and [`crate::CARD_COMMISSION_RATE`].

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::{CARD_COMMISSION_RATE, TAX_RATE};

// =============================================================================
// Sales Totals
// =============================================================================

/// A shift's committed sales, summed by payment method.
///
/// Produced by the sales aggregator from the tender rows of non-voided
/// sales. Mixed sales arrive here already decomposed into their recorded
/// per-method amounts, so each bucket is exact and the grand total counts
/// nothing twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesTotals {
    /// Number of non-voided sales.
    pub count: i64,
    pub cash: Money,
    pub card: Money,
    pub transfer: Money,
    pub deposit: Money,
}

impl SalesTotals {
    /// Totals with no sales at all.
    pub fn zero() -> Self {
        SalesTotals::default()
    }

    /// Grand total across every payment method.
    pub fn total(&self) -> Money {
        self.cash + self.card + self.transfer + self.deposit
    }
}

// =============================================================================
// Withholdings
// =============================================================================

/// The amounts withheld from a shift's gross sales, per method, with the
/// card bucket's commission/tax split kept visible for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withholdings {
    /// 16% of cash sales.
    pub tax_cash: Money,
    /// 16% of transfer sales.
    pub tax_transfer: Money,
    /// 16% of deposit sales.
    pub tax_deposit: Money,
    /// 6% of card sales, taken by the bank on settlement.
    pub card_commission: Money,
    /// 16% of card sales net of the bank commission.
    pub tax_card: Money,
}

impl Withholdings {
    /// Computes every withholding from the aggregated sales totals.
    ///
    /// Each line is one rate application (one half-up rounding); nothing
    /// here re-rounds a figure another line produced.
    pub fn compute(sales: &SalesTotals) -> Self {
        let card_commission = sales.card.apply_rate(CARD_COMMISSION_RATE);
        let tax_card = (sales.card - card_commission).apply_rate(TAX_RATE);

        Withholdings {
            tax_cash: sales.cash.apply_rate(TAX_RATE),
            tax_transfer: sales.transfer.apply_rate(TAX_RATE),
            tax_deposit: sales.deposit.apply_rate(TAX_RATE),
            card_commission,
            tax_card,
        }
    }

    /// Total withheld from the card bucket (commission plus tax).
    pub fn card_total(&self) -> Money {
        self.card_commission + self.tax_card
    }

    /// Total withheld across all methods.
    pub fn total(&self) -> Money {
        self.tax_cash + self.tax_transfer + self.tax_deposit + self.card_total()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn q(centavos: i64) -> Money {
        Money::from_centavos(centavos)
    }

    #[test]
    fn test_totals_grand_total() {
        let sales = SalesTotals {
            count: 3,
            cash: q(20_000),
            card: q(100_000),
            transfer: q(5_000),
            deposit: q(2_500),
        };
        assert_eq!(sales.total().centavos(), 127_500);
    }

    #[test]
    fn test_zero_sales_zero_withholdings() {
        let w = Withholdings::compute(&SalesTotals::zero());
        assert_eq!(w.total(), Money::zero());
        assert_eq!(w.card_total(), Money::zero());
    }

    #[test]
    fn test_simple_method_tax() {
        let sales = SalesTotals {
            count: 1,
            cash: q(10_000), // Q100.00
            ..SalesTotals::zero()
        };
        let w = Withholdings::compute(&sales);
        assert_eq!(w.tax_cash.centavos(), 1_600); // Q16.00
        assert_eq!(w.tax_transfer, Money::zero());
        assert_eq!(w.tax_deposit, Money::zero());
    }

    #[test]
    fn test_card_double_deduction_exact_factors() {
        // C = Q1000.00: commission 0.06C = Q60.00,
        // tax 0.16 x 0.94C = 0.1504C = Q150.40, total 0.2104C = Q210.40
        let sales = SalesTotals {
            count: 1,
            card: q(100_000),
            ..SalesTotals::zero()
        };
        let w = Withholdings::compute(&sales);

        assert_eq!(w.card_commission.centavos(), 6_000);
        assert_eq!(w.tax_card.centavos(), 15_040);
        assert_eq!(w.card_total().centavos(), 21_040);
    }

    #[test]
    fn test_card_tax_applies_after_commission() {
        // The tax base is the settled amount, not the gross: for Q50.00
        // card sales, commission = Q3.00 and tax = 16% of Q47.00 = Q7.52,
        // not 16% of Q50.00 = Q8.00.
        let sales = SalesTotals {
            count: 1,
            card: q(5_000),
            ..SalesTotals::zero()
        };
        let w = Withholdings::compute(&sales);
        assert_eq!(w.card_commission.centavos(), 300);
        assert_eq!(w.tax_card.centavos(), 752);
    }

    #[test]
    fn test_total_sums_every_method() {
        let sales = SalesTotals {
            count: 4,
            cash: q(10_000),
            card: q(100_000),
            transfer: q(20_000),
            deposit: q(30_000),
        };
        let w = Withholdings::compute(&sales);

        // 1600 + 3200 + 4800 + 21040
        assert_eq!(w.total().centavos(), 1_600 + 3_200 + 4_800 + 21_040);
    }
}
