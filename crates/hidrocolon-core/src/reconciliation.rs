//! # Reconciliation Module
//!
//! The pure computation behind shift close: combine opening cash,
//! aggregated sales, drawer outflows and the counted closing drawer into
//! the figures the closed shift row freezes.
//!
//! ## The Close Computation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  opening cash ─┐                                                    │
//! │  sales totals ─┤                                                    │
//! │  withholdings ─┼──► net sales, amount to deposit, expected cash     │
//! │  expenses ─────┤                                                    │
//! │  commissions ──┘                                                    │
//! │                                                                     │
//! │  expected cash  vs  counted cash        → cash variance             │
//! │  card sales     vs  recorded vouchers   → voucher variance          │
//! │  transfer sales vs  recorded transfers  → transfer variance         │
//! │                                                                     │
//! │  any |variance| > Q0.50  →  requires authorization                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is deterministic and I/O-free. The persistence layer
//! feeds it aggregates read inside the close transaction, so the figures
//! it computes are the figures that get persisted, with no window for
//! drift in between. The dashboard summary uses these same functions,
//! which is what keeps a live summary consistent with the eventual close.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::withholding::{SalesTotals, Withholdings};
use crate::VARIANCE_TOLERANCE;

// =============================================================================
// Close Input
// =============================================================================

/// Everything the reconciliation needs, gathered by the caller.
///
/// All aggregate fields must come from the same consistent read (in
/// practice: the same database transaction as the close itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseInput {
    /// Drawer total counted at shift open.
    pub opening_total: Money,
    /// Drawer total counted at shift close.
    pub closing_total: Money,
    /// Non-voided sales summed by method.
    pub sales: SalesTotals,
    /// Cash expenses paid out of the drawer this shift.
    pub expenses: Money,
    /// Doctor commissions paid out of the drawer this shift.
    pub commissions_paid: Money,
    /// Card voucher slips recorded this shift.
    pub vouchers_recorded: Money,
    /// Bank transfer receipts recorded this shift.
    pub transfers_recorded: Money,
}

// =============================================================================
// Reconciliation
// =============================================================================

/// The computed close figures, ready to persist onto the shift row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub sales: SalesTotals,
    pub withholdings: Withholdings,
    /// Gross sales minus every withholding.
    pub net_sales: Money,
    /// What the drawer should physically contain at close.
    pub expected_cash: Money,
    /// What must be taken to the bank: everything except card settlement,
    /// net of cash outflows.
    pub amount_to_deposit: Money,
    /// counted closing cash − expected cash.
    pub cash_variance: Money,
    /// recorded vouchers − card sales.
    pub voucher_variance: Money,
    /// recorded transfers − transfer sales.
    pub transfer_variance: Money,
    /// True when any variance leaves the Q0.50 tolerance band.
    pub requires_authorization: bool,
}

impl Reconciliation {
    /// Runs the full close computation.
    pub fn compute(input: &CloseInput) -> Self {
        let withholdings = Withholdings::compute(&input.sales);

        let net_sales = net_sales(&input.sales, &withholdings);
        let expected_cash = expected_cash(
            input.opening_total,
            input.sales.cash,
            input.expenses,
            input.commissions_paid,
        );
        let amount_to_deposit =
            amount_to_deposit(&input.sales, input.expenses, input.commissions_paid);

        let cash_variance = input.closing_total - expected_cash;
        let voucher_variance = input.vouchers_recorded - input.sales.card;
        let transfer_variance = input.transfers_recorded - input.sales.transfer;

        let requires_authorization = exceeds_tolerance(cash_variance)
            || exceeds_tolerance(voucher_variance)
            || exceeds_tolerance(transfer_variance);

        Reconciliation {
            sales: input.sales,
            withholdings,
            net_sales,
            expected_cash,
            amount_to_deposit,
            cash_variance,
            voucher_variance,
            transfer_variance,
            requires_authorization,
        }
    }
}

// =============================================================================
// Component Formulas
// =============================================================================
// Exposed separately so the live shift summary can project the same
// figures for an open shift without inventing a closing count.

/// Gross sales minus every withholding.
pub fn net_sales(sales: &SalesTotals, withholdings: &Withholdings) -> Money {
    sales.total() - withholdings.total()
}

/// What the drawer should physically contain:
/// opening cash + cash sales − expenses − commissions paid.
pub fn expected_cash(
    opening_total: Money,
    cash_sales: Money,
    expenses: Money,
    commissions_paid: Money,
) -> Money {
    opening_total + cash_sales - expenses - commissions_paid
}

/// What goes to the bank: total sales minus card settlement (the
/// processor deposits that directly), minus the cash outflows already
/// taken from the drawer.
pub fn amount_to_deposit(sales: &SalesTotals, expenses: Money, commissions_paid: Money) -> Money {
    sales.total() - sales.card - expenses - commissions_paid
}

/// A variance inside the Q0.50 band is rounding drift and closes without
/// sign-off; anything beyond it is a hard authorization gate. The
/// boundary itself passes: exactly Q0.50 does not require authorization.
fn exceeds_tolerance(variance: Money) -> bool {
    variance.abs() > VARIANCE_TOLERANCE
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

    fn balanced_input() -> CloseInput {
        // Opening Q510.00, one Q200.00 cash sale, one Q1000.00 card sale,
        // drawer counted at exactly opening + cash sales.
        CloseInput {
            opening_total: q(51_000),
            closing_total: q(71_000),
            sales: SalesTotals {
                count: 2,
                cash: q(20_000),
                card: q(100_000),
                transfer: Money::zero(),
                deposit: Money::zero(),
            },
            expenses: Money::zero(),
            commissions_paid: Money::zero(),
            vouchers_recorded: q(100_000),
            transfers_recorded: Money::zero(),
        }
    }

    #[test]
    fn test_balanced_close_has_no_variances() {
        let r = Reconciliation::compute(&balanced_input());

        assert_eq!(r.expected_cash.centavos(), 71_000);
        assert_eq!(r.cash_variance, Money::zero());
        assert_eq!(r.voucher_variance, Money::zero());
        assert_eq!(r.transfer_variance, Money::zero());
        assert!(!r.requires_authorization);
    }

    #[test]
    fn test_balanced_close_figures() {
        let r = Reconciliation::compute(&balanced_input());

        // Card: commission Q60.00, tax Q150.40; cash tax Q32.00
        assert_eq!(r.withholdings.card_commission.centavos(), 6_000);
        assert_eq!(r.withholdings.tax_card.centavos(), 15_040);
        assert_eq!(r.withholdings.tax_cash.centavos(), 3_200);

        // Net sales: 120000 − (3200 + 6000 + 15040)
        assert_eq!(r.net_sales.centavos(), 120_000 - 24_240);

        // To deposit: 120000 − 100000 − 0 − 0 = Q200.00
        assert_eq!(r.amount_to_deposit.centavos(), 20_000);
    }

    #[test]
    fn test_expenses_and_commissions_reduce_expected_cash() {
        let mut input = balanced_input();
        input.expenses = q(5_000); // Q50.00
        input.commissions_paid = q(2_500); // Q25.00
        input.closing_total = q(71_000 - 7_500);

        let r = Reconciliation::compute(&input);
        assert_eq!(r.expected_cash.centavos(), 71_000 - 7_500);
        assert_eq!(r.cash_variance, Money::zero());
        // Outflows also reduce what can be deposited
        assert_eq!(r.amount_to_deposit.centavos(), 20_000 - 7_500);
    }

    #[test]
    fn test_tolerance_boundary_half_quetzal_passes() {
        let mut input = balanced_input();
        input.closing_total = q(71_000 + 50);

        let r = Reconciliation::compute(&input);
        assert_eq!(r.cash_variance.centavos(), 50);
        assert!(!r.requires_authorization);
    }

    #[test]
    fn test_tolerance_boundary_fifty_one_requires_authorization() {
        let mut input = balanced_input();
        input.closing_total = q(71_000 + 51);

        let r = Reconciliation::compute(&input);
        assert_eq!(r.cash_variance.centavos(), 51);
        assert!(r.requires_authorization);
    }

    #[test]
    fn test_shortage_gates_like_overage() {
        // Missing cash is as gated as surplus cash
        let mut input = balanced_input();
        input.closing_total = q(71_000 - 51);

        let r = Reconciliation::compute(&input);
        assert_eq!(r.cash_variance.centavos(), -51);
        assert!(r.requires_authorization);
    }

    #[test]
    fn test_voucher_variance_gates_authorization() {
        let mut input = balanced_input();
        // One voucher slip missing: recorded Q900.00 against Q1000.00 card
        input.vouchers_recorded = q(90_000);

        let r = Reconciliation::compute(&input);
        assert_eq!(r.voucher_variance.centavos(), -10_000);
        assert!(r.requires_authorization);
    }

    #[test]
    fn test_transfer_variance_gates_authorization() {
        let mut input = balanced_input();
        input.sales.transfer = q(30_000);
        input.transfers_recorded = q(30_100);

        let r = Reconciliation::compute(&input);
        assert_eq!(r.transfer_variance.centavos(), 100);
        assert!(r.requires_authorization);
    }

    #[test]
    fn test_empty_shift_reconciles_to_opening() {
        let input = CloseInput {
            opening_total: q(51_000),
            closing_total: q(51_000),
            sales: SalesTotals::zero(),
            expenses: Money::zero(),
            commissions_paid: Money::zero(),
            vouchers_recorded: Money::zero(),
            transfers_recorded: Money::zero(),
        };

        let r = Reconciliation::compute(&input);
        assert_eq!(r.expected_cash.centavos(), 51_000);
        assert_eq!(r.net_sales, Money::zero());
        assert_eq!(r.amount_to_deposit, Money::zero());
        assert!(!r.requires_authorization);
    }
}
