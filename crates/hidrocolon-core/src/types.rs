//! # Domain Types
//!
//! Core domain types for the Hidrocolon backend.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌───────────────┐   ┌───────────────┐   ┌───────────────────┐     │
//! │  │     Shift     │   │     Sale      │   │    SaleTender     │     │
//! │  │  ───────────  │   │  ───────────  │   │  ───────────────  │     │
//! │  │  id (i64)     │◄──│  shift_id     │◄──│  sale_id          │     │
//! │  │  status       │   │  method       │   │  method           │     │
//! │  │  breakdowns   │   │  total        │   │  amount           │     │
//! │  │  close figures│   │  void audit   │   └───────────────────┘     │
//! │  └───────────────┘   └───────────────┘                             │
//! │                                                                     │
//! │  Expense / CardVoucher / BankTransfer / BankDeposit                 │
//! │    flat per-shift records feeding reconciliation totals             │
//! │                                                                     │
//! │  SaleItem ──► CommissionPayment (batch payout, lines stamped paid)  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity Pattern
//! - Shifts: sequential integer id (one register, one sequence)
//! - Everything hanging off a shift: UUID v4 string id

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::denomination::CashBreakdown;
use crate::money::Money;

// =============================================================================
// Rate
// =============================================================================

/// A percentage rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1600 bps = 16% (the statutory withholding rate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Checks if the rate is zero.
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
// Shift Status
// =============================================================================

/// The lifecycle status of a cash-register shift.
///
/// At most one shift is `Open` system-wide at any time; the transition to
/// `Closed` happens exactly once, through the reconciliation close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    /// Shift is open and accumulating sales, expenses and payouts.
    Open,
    /// Shift has been reconciled and frozen.
    Closed,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was paid for, as recorded on the sale itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash into the drawer.
    Cash,
    /// Card on the external terminal, settled by the processor.
    Card,
    /// Bank transfer.
    Transfer,
    /// Direct bank deposit.
    Deposit,
    /// More than one of the above; decomposed into tender rows.
    Mixed,
}

/// The method of a single tender row.
///
/// Tender rows are the decomposed form of a sale's payment: a plain sale
/// has exactly one, a mixed sale has one per method. `Mixed` is not
/// representable here on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TenderMethod {
    Cash,
    Card,
    Transfer,
    Deposit,
}

impl TenderMethod {
    /// The sale-level payment method a single tender of this kind implies.
    pub fn as_payment_method(self) -> PaymentMethod {
        match self {
            TenderMethod::Cash => PaymentMethod::Cash,
            TenderMethod::Card => PaymentMethod::Card,
            TenderMethod::Transfer => PaymentMethod::Transfer,
            TenderMethod::Deposit => PaymentMethod::Deposit,
        }
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale.
///
/// Voiding is a proper status transition with an audit trail, not a marker
/// substring in a notes field. A voided sale disappears from every
/// financial aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale is committed and counts toward shift totals.
    Completed,
    /// Sale was cancelled; excluded from all aggregates.
    Voided,
}

// =============================================================================
// Shift
// =============================================================================

/// One operator's cash-register session from open to close.
///
/// ## Derived Fields Are Cached Outputs
/// Every `Option<i64>` figure below is written exactly once, by the close
/// operation, from the subordinate records (sales, tenders, expenses,
/// payouts). The records stay the source of truth; the shift row is the
/// frozen report of what close computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: i64,

    /// Operator (cashier) who opened the shift.
    pub operator_id: String,

    pub status: ShiftStatus,

    /// Counted drawer at open.
    pub opening_breakdown: CashBreakdown,

    /// Derived from `opening_breakdown` at open time.
    pub opening_total_centavos: i64,

    /// Counted drawer at close.
    pub closing_breakdown: Option<CashBreakdown>,
    pub closing_total_centavos: Option<i64>,

    // Aggregated at close from non-voided sales.
    pub sales_count: Option<i64>,
    pub sales_cash_centavos: Option<i64>,
    pub sales_card_centavos: Option<i64>,
    pub sales_transfer_centavos: Option<i64>,
    pub sales_deposit_centavos: Option<i64>,
    pub sales_total_centavos: Option<i64>,

    // Aggregated at close from per-shift records.
    pub expenses_total_centavos: Option<i64>,
    pub commissions_paid_centavos: Option<i64>,
    pub vouchers_recorded_centavos: Option<i64>,
    pub transfers_recorded_centavos: Option<i64>,
    pub deposits_recorded_centavos: Option<i64>,

    // Withholdings computed at close.
    pub tax_cash_centavos: Option<i64>,
    pub tax_transfer_centavos: Option<i64>,
    pub tax_deposit_centavos: Option<i64>,
    pub card_commission_centavos: Option<i64>,
    pub tax_card_centavos: Option<i64>,

    // Reconciliation figures computed at close.
    pub net_sales_centavos: Option<i64>,
    pub amount_to_deposit_centavos: Option<i64>,
    pub expected_cash_centavos: Option<i64>,
    pub cash_variance_centavos: Option<i64>,
    pub voucher_variance_centavos: Option<i64>,
    pub transfer_variance_centavos: Option<i64>,

    // Authorization trail for out-of-tolerance closes.
    pub requires_authorization: bool,
    pub authorized_by: Option<String>,
    pub justification: Option<String>,
    pub authorized_at: Option<DateTime<Utc>>,

    /// Free-text close observations from the operator.
    pub observations: Option<String>,

    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Shift {
    /// Returns the opening drawer total as Money.
    #[inline]
    pub fn opening_total(&self) -> Money {
        Money::from_centavos(self.opening_total_centavos)
    }

    /// Returns the counted closing total, if the shift has closed.
    #[inline]
    pub fn closing_total(&self) -> Option<Money> {
        self.closing_total_centavos.map(Money::from_centavos)
    }

    /// Returns the cash variance, if the shift has closed.
    #[inline]
    pub fn cash_variance(&self) -> Option<Money> {
        self.cash_variance_centavos.map(Money::from_centavos)
    }

    /// Checks whether the shift is open.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == ShiftStatus::Open
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale transaction.
///
/// Immutable once created, except for the single completed → voided
/// transition (which stamps the audit fields below).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub shift_id: i64,
    pub method: PaymentMethod,
    pub total_centavos: i64,
    pub status: SaleStatus,
    /// Operator annotations. Never used to encode status.
    pub notes: Option<String>,
    pub voided_by: Option<String>,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the gross total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_centavos(self.total_centavos)
    }

    /// Checks whether the sale has been voided.
    #[inline]
    pub fn is_voided(&self) -> bool {
        self.status == SaleStatus::Voided
    }
}

// =============================================================================
// Sale Tender
// =============================================================================

/// One method's share of a sale's payment.
///
/// For cash tenders the amount is the cash retained in the drawer
/// (received minus change given), so tender amounts always sum exactly to
/// the sale total. Aggregation reads these rows as-is and never recomputes
/// a split from the gross.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleTender {
    pub id: String,
    pub sale_id: String,
    pub method: TenderMethod,
    pub amount_centavos: i64,
    /// External reference: voucher number, transfer reference, slip number.
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SaleTender {
    /// Returns the tender amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_centavos(self.amount_centavos)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
///
/// Uses the snapshot pattern to freeze medication data at time of sale,
/// and carries the attending doctor's commission for later batch payout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub medication_id: String,
    /// Catalog code at time of sale (frozen).
    pub code_snapshot: String,
    /// Display name at time of sale (frozen).
    pub name_snapshot: String,
    /// Unit price in centavos at time of sale (frozen).
    pub unit_price_centavos: i64,
    pub quantity: i64,
    /// unit price × quantity.
    pub line_total_centavos: i64,
    /// Attending doctor, when the line accrues a commission.
    pub doctor_id: Option<String>,
    /// Commission owed to the doctor for this line.
    pub commission_centavos: i64,
    /// Set when a commission payment has settled this line. A stamped
    /// line never enters another payout aggregation.
    pub commission_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_centavos(self.line_total_centavos)
    }

    /// Checks whether this line still awaits commission payout.
    #[inline]
    pub fn commission_unpaid(&self) -> bool {
        self.commission_centavos > 0 && self.commission_payment_id.is_none()
    }
}

// =============================================================================
// Drawer Records
// =============================================================================

/// A cash expense paid out of the drawer during a shift.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Expense {
    pub id: String,
    pub shift_id: i64,
    pub amount_centavos: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A physical card voucher slip recorded against a shift.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CardVoucher {
    pub id: String,
    pub shift_id: i64,
    pub amount_centavos: i64,
    pub voucher_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A bank transfer receipt recorded against a shift.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BankTransfer {
    pub id: String,
    pub shift_id: i64,
    pub amount_centavos: i64,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A bank deposit slip recorded against a shift.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BankDeposit {
    pub id: String,
    pub shift_id: i64,
    pub amount_centavos: i64,
    pub slip_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Commission Payment
// =============================================================================

/// A batch payout of a doctor's accrued commissions.
///
/// Creation aggregates the doctor's unpaid commission lines up to the
/// cutoff date and stamps each one with this payment's id, in a single
/// transaction. A line is settled by at most one payment, ever.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CommissionPayment {
    pub id: String,
    pub doctor_id: String,
    /// Shift whose drawer funded the payout, when paid from the register.
    pub shift_id: Option<i64>,
    /// Lines created on or before this date were eligible.
    pub cutoff_date: NaiveDate,
    pub total_centavos: i64,
    pub line_count: i64,
    pub created_at: DateTime<Utc>,
}

impl CommissionPayment {
    /// Returns the payout total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_centavos(self.total_centavos)
    }
}

// =============================================================================
// Medication
// =============================================================================

/// A catalog item available for sale.
///
/// Only the slice sale creation needs: price/commission snapshot source
/// and the guarded stock count. Catalog management lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Medication {
    pub id: String,
    pub code: String,
    pub name: String,
    pub price_centavos: i64,
    /// Attending doctor's commission rate for this item, in basis points.
    pub commission_rate_bps: u32,
    pub stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medication {
    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_centavos(self.price_centavos)
    }

    /// Returns the commission rate.
    #[inline]
    pub fn commission_rate(&self) -> Rate {
        Rate::from_bps(self.commission_rate_bps)
    }

    /// Checks whether the requested quantity is sellable from stock.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && self.stock >= quantity
    }
}

// =============================================================================
// User
// =============================================================================

/// A system user: operators open shifts, authorizers sign off on
/// out-of-tolerance closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    /// Whether this user may authorize an out-of-tolerance close.
    pub can_authorize: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A doctor who accrues per-line commissions on attended sales.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_from_bps() {
        let rate = Rate::from_bps(1600);
        assert_eq!(rate.bps(), 1600);
        assert!((rate.percentage() - 16.0).abs() < 0.001);
    }

    #[test]
    fn test_tender_method_maps_to_payment_method() {
        assert_eq!(
            TenderMethod::Cash.as_payment_method(),
            PaymentMethod::Cash
        );
        assert_eq!(
            TenderMethod::Deposit.as_payment_method(),
            PaymentMethod::Deposit
        );
    }

    #[test]
    fn test_medication_can_sell() {
        let now = Utc::now();
        let med = Medication {
            id: "m1".into(),
            code: "AMOX-500".into(),
            name: "Amoxicilina 500mg".into(),
            price_centavos: 2500,
            commission_rate_bps: 1000,
            stock: 3,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        assert!(med.can_sell(3));
        assert!(!med.can_sell(4));

        let inactive = Medication {
            is_active: false,
            ..med
        };
        assert!(!inactive.can_sell(1));
    }

    #[test]
    fn test_sale_item_commission_unpaid() {
        let now = Utc::now();
        let mut item = SaleItem {
            id: "i1".into(),
            sale_id: "s1".into(),
            medication_id: "m1".into(),
            code_snapshot: "AMOX-500".into(),
            name_snapshot: "Amoxicilina 500mg".into(),
            unit_price_centavos: 2500,
            quantity: 2,
            line_total_centavos: 5000,
            doctor_id: Some("d1".into()),
            commission_centavos: 500,
            commission_payment_id: None,
            created_at: now,
        };
        assert!(item.commission_unpaid());

        item.commission_payment_id = Some("p1".into());
        assert!(!item.commission_unpaid());
    }
}
