//! # Shift Repository
//!
//! The shift lifecycle: open, live summary, reconciled close, queries.
//!
//! ## Shift Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Shift Lifecycle                               │
//! │                                                                     │
//! │  1. OPEN                                                            │
//! │     └── open() → Shift { status: Open, opening totals }             │
//! │         (the partial unique index rejects a second open)            │
//! │                                                                     │
//! │  2. ACCUMULATE                                                      │
//! │     └── sales, expenses, vouchers, transfers, deposits and          │
//! │         commission payouts reference the open shift                 │
//! │     └── summary() → live recomputation for the dashboard            │
//! │                                                                     │
//! │  3. CLOSE (exactly once)                                            │
//! │     └── close() in ONE transaction:                                 │
//! │         ├── aggregate sales by method (voided excluded)             │
//! │         ├── sum expenses / payouts / vouchers / transfers           │
//! │         ├── compute withholdings + reconciliation figures           │
//! │         ├── authorization gate on out-of-tolerance variances        │
//! │         └── UPDATE ... WHERE status = 'open' (loser of a close      │
//! │             race affects 0 rows and fails as already-closed)        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The aggregation queries here are the sales aggregator of the system:
//! `summary` and `close` call the same functions, so the dashboard always
//! shows the figures close would persist at that instant.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{commission, drawer, user};
use hidrocolon_core::reconciliation::{amount_to_deposit, expected_cash, net_sales};
use hidrocolon_core::validation::{validate_justification, validate_uuid};
use hidrocolon_core::{
    CashBreakdown, CloseInput, CoreError, Money, Reconciliation, SalesTotals, Shift, ShiftStatus,
    Withholdings,
};

const SHIFT_COLUMNS: &str = "id, operator_id, status, opening_breakdown, opening_total_centavos, \
     closing_breakdown, closing_total_centavos, sales_count, sales_cash_centavos, \
     sales_card_centavos, sales_transfer_centavos, sales_deposit_centavos, sales_total_centavos, \
     expenses_total_centavos, commissions_paid_centavos, vouchers_recorded_centavos, \
     transfers_recorded_centavos, deposits_recorded_centavos, tax_cash_centavos, \
     tax_transfer_centavos, tax_deposit_centavos, card_commission_centavos, tax_card_centavos, \
     net_sales_centavos, amount_to_deposit_centavos, expected_cash_centavos, \
     cash_variance_centavos, voucher_variance_centavos, transfer_variance_centavos, \
     requires_authorization, authorized_by, justification, authorized_at, observations, \
     opened_at, closed_at";

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw shift row: the denomination blobs arrive as JSON text.
#[derive(Debug, sqlx::FromRow)]
struct ShiftRow {
    id: i64,
    operator_id: String,
    status: ShiftStatus,
    opening_breakdown: String,
    opening_total_centavos: i64,
    closing_breakdown: Option<String>,
    closing_total_centavos: Option<i64>,
    sales_count: Option<i64>,
    sales_cash_centavos: Option<i64>,
    sales_card_centavos: Option<i64>,
    sales_transfer_centavos: Option<i64>,
    sales_deposit_centavos: Option<i64>,
    sales_total_centavos: Option<i64>,
    expenses_total_centavos: Option<i64>,
    commissions_paid_centavos: Option<i64>,
    vouchers_recorded_centavos: Option<i64>,
    transfers_recorded_centavos: Option<i64>,
    deposits_recorded_centavos: Option<i64>,
    tax_cash_centavos: Option<i64>,
    tax_transfer_centavos: Option<i64>,
    tax_deposit_centavos: Option<i64>,
    card_commission_centavos: Option<i64>,
    tax_card_centavos: Option<i64>,
    net_sales_centavos: Option<i64>,
    amount_to_deposit_centavos: Option<i64>,
    expected_cash_centavos: Option<i64>,
    cash_variance_centavos: Option<i64>,
    voucher_variance_centavos: Option<i64>,
    transfer_variance_centavos: Option<i64>,
    requires_authorization: bool,
    authorized_by: Option<String>,
    justification: Option<String>,
    authorized_at: Option<DateTime<Utc>>,
    observations: Option<String>,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ShiftRow> for Shift {
    type Error = DbError;

    fn try_from(row: ShiftRow) -> Result<Self, Self::Error> {
        let opening_breakdown: CashBreakdown = serde_json::from_str(&row.opening_breakdown)?;
        let closing_breakdown = match row.closing_breakdown {
            Some(blob) => Some(serde_json::from_str(&blob)?),
            None => None,
        };

        Ok(Shift {
            id: row.id,
            operator_id: row.operator_id,
            status: row.status,
            opening_breakdown,
            opening_total_centavos: row.opening_total_centavos,
            closing_breakdown,
            closing_total_centavos: row.closing_total_centavos,
            sales_count: row.sales_count,
            sales_cash_centavos: row.sales_cash_centavos,
            sales_card_centavos: row.sales_card_centavos,
            sales_transfer_centavos: row.sales_transfer_centavos,
            sales_deposit_centavos: row.sales_deposit_centavos,
            sales_total_centavos: row.sales_total_centavos,
            expenses_total_centavos: row.expenses_total_centavos,
            commissions_paid_centavos: row.commissions_paid_centavos,
            vouchers_recorded_centavos: row.vouchers_recorded_centavos,
            transfers_recorded_centavos: row.transfers_recorded_centavos,
            deposits_recorded_centavos: row.deposits_recorded_centavos,
            tax_cash_centavos: row.tax_cash_centavos,
            tax_transfer_centavos: row.tax_transfer_centavos,
            tax_deposit_centavos: row.tax_deposit_centavos,
            card_commission_centavos: row.card_commission_centavos,
            tax_card_centavos: row.tax_card_centavos,
            net_sales_centavos: row.net_sales_centavos,
            amount_to_deposit_centavos: row.amount_to_deposit_centavos,
            expected_cash_centavos: row.expected_cash_centavos,
            cash_variance_centavos: row.cash_variance_centavos,
            voucher_variance_centavos: row.voucher_variance_centavos,
            transfer_variance_centavos: row.transfer_variance_centavos,
            requires_authorization: row.requires_authorization,
            authorized_by: row.authorized_by,
            justification: row.justification,
            authorized_at: row.authorized_at,
            observations: row.observations,
            opened_at: row.opened_at,
            closed_at: row.closed_at,
        })
    }
}

// =============================================================================
// Requests and DTOs
// =============================================================================

/// Input for the close operation.
#[derive(Debug, Clone)]
pub struct CloseShiftRequest {
    pub shift_id: i64,
    /// The physically counted closing drawer.
    pub closing: CashBreakdown,
    /// Required when any variance leaves the tolerance band.
    pub authorized_by: Option<String>,
    /// Required alongside `authorized_by`.
    pub justification: Option<String>,
    /// Free-text close observations.
    pub observations: Option<String>,
}

/// Live (non-persisted) recomputation of an open shift's figures.
///
/// Produced by the same aggregation and withholding functions the close
/// uses, so the dashboard never disagrees with the eventual close.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ShiftSummary {
    pub shift_id: i64,
    pub status: ShiftStatus,
    pub opening_total: Money,
    pub sales: SalesTotals,
    pub withholdings: Withholdings,
    pub expenses: Money,
    pub commissions_paid: Money,
    pub vouchers_recorded: Money,
    pub transfers_recorded: Money,
    pub deposits_recorded: Money,
    pub net_sales: Money,
    pub amount_to_deposit: Money,
    /// What the drawer should contain right now.
    pub expected_cash: Money,
}

/// Historical query filter for `list`.
#[derive(Debug, Clone)]
pub struct ShiftFilter {
    /// Opened-at lower bound (inclusive).
    pub from: Option<DateTime<Utc>>,
    /// Opened-at upper bound (exclusive).
    pub to: Option<DateTime<Utc>>,
    pub operator_id: Option<String>,
    pub status: Option<ShiftStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ShiftFilter {
    fn default() -> Self {
        ShiftFilter {
            from: None,
            to: None,
            operator_id: None,
            status: None,
            limit: 50,
            offset: 0,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for shift lifecycle operations.
#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    /// Creates a new ShiftRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Open
    // -------------------------------------------------------------------------

    /// Opens a new shift with the counted opening drawer.
    ///
    /// ## Single-Open-Shift Invariant
    /// The insert relies on the partial unique index
    /// `ux_shifts_single_open`: of two racing opens, exactly one row
    /// lands and the other surfaces as `ShiftAlreadyOpen`. There is no
    /// check-then-insert window.
    pub async fn open(&self, operator_id: &str, opening: CashBreakdown) -> DbResult<Shift> {
        validate_uuid("operator_id", operator_id).map_err(CoreError::from)?;

        let mut conn = self.pool.acquire().await?;
        match user::fetch(&mut conn, operator_id).await? {
            None => return Err(CoreError::UserNotFound(operator_id.to_string()).into()),
            Some(operator) if !operator.is_active => {
                return Err(CoreError::InactiveUser {
                    user_id: operator_id.to_string(),
                }
                .into())
            }
            Some(_) => {}
        }
        drop(conn);

        let opening_total = opening.total();
        let opening_blob = serde_json::to_string(&opening)?;
        let now = Utc::now();

        debug!(operator_id, opening_total = %opening_total, "Opening shift");

        let result = sqlx::query(
            "INSERT INTO shifts (
                operator_id, status, opening_breakdown, opening_total_centavos,
                requires_authorization, opened_at
            ) VALUES (?1, 'open', ?2, ?3, 0, ?4)",
        )
        .bind(operator_id)
        .bind(&opening_blob)
        .bind(opening_total.centavos())
        .bind(now)
        .execute(&self.pool)
        .await;

        let shift_id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(err) => {
                let db_err = DbError::from(err);
                if db_err.is_unique_violation_on("shifts.status")
                    || db_err.is_unique_violation_on("ux_shifts_single_open")
                {
                    return Err(CoreError::ShiftAlreadyOpen.into());
                }
                return Err(db_err);
            }
        };

        info!(shift_id, operator_id, opening_total = %opening_total, "Shift opened");

        self.get_by_id(shift_id)
            .await?
            .ok_or_else(|| DbError::not_found("Shift", shift_id.to_string()))
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Gets a shift by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Shift>> {
        let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?1");
        let row: Option<ShiftRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Shift::try_from).transpose()
    }

    /// Gets the single open shift, if any.
    pub async fn get_active(&self) -> DbResult<Option<Shift>> {
        let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE status = 'open' LIMIT 1");
        let row: Option<ShiftRow> = sqlx::query_as(&sql).fetch_optional(&self.pool).await?;

        row.map(Shift::try_from).transpose()
    }

    /// Historical shift query by date range, operator and status.
    pub async fn list(&self, filter: &ShiftFilter) -> DbResult<Vec<Shift>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE 1 = 1"));

        if let Some(from) = filter.from {
            qb.push(" AND opened_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND opened_at < ").push_bind(to);
        }
        if let Some(operator_id) = &filter.operator_id {
            qb.push(" AND operator_id = ").push_bind(operator_id.clone());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }

        qb.push(" ORDER BY opened_at DESC LIMIT ")
            .push_bind(filter.limit.max(0))
            .push(" OFFSET ")
            .push_bind(filter.offset.max(0));

        let rows: Vec<ShiftRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        rows.into_iter().map(Shift::try_from).collect()
    }

    // -------------------------------------------------------------------------
    // Summary
    // -------------------------------------------------------------------------

    /// Live recomputation of a shift's current figures.
    ///
    /// Nothing is persisted; every total comes from the subordinate
    /// records at this instant. For a closed shift this reproduces the
    /// frozen figures, because the records stopped changing at close.
    pub async fn summary(&self, shift_id: i64) -> DbResult<ShiftSummary> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?1");
        let row: Option<ShiftRow> = sqlx::query_as(&sql)
            .bind(shift_id)
            .fetch_optional(&mut *conn)
            .await?;
        let row = row.ok_or(CoreError::ShiftNotFound(shift_id))?;

        let sales = sales_totals(&mut conn, shift_id).await?;
        let withholdings = Withholdings::compute(&sales);
        let expenses = drawer::expenses_total(&mut conn, shift_id).await?;
        let commissions_paid = commission::paid_total(&mut conn, shift_id).await?;
        let vouchers_recorded = drawer::vouchers_total(&mut conn, shift_id).await?;
        let transfers_recorded = drawer::transfers_total(&mut conn, shift_id).await?;
        let deposits_recorded = drawer::deposits_total(&mut conn, shift_id).await?;

        let opening_total = Money::from_centavos(row.opening_total_centavos);

        Ok(ShiftSummary {
            shift_id,
            status: row.status,
            opening_total,
            sales,
            withholdings,
            expenses,
            commissions_paid,
            vouchers_recorded,
            transfers_recorded,
            deposits_recorded,
            net_sales: net_sales(&sales, &withholdings),
            amount_to_deposit: amount_to_deposit(&sales, expenses, commissions_paid),
            expected_cash: expected_cash(opening_total, sales.cash, expenses, commissions_paid),
        })
    }

    // -------------------------------------------------------------------------
    // Close
    // -------------------------------------------------------------------------

    /// Closes a shift: aggregates, reconciles, gates on authorization and
    /// freezes the figures, all in one transaction.
    ///
    /// ## Failure Modes
    /// - `ShiftNotFound` / `ShiftAlreadyClosed`: nothing persisted
    /// - `AuthorizationRequired`: a variance left the tolerance band and
    ///   no authorizer was supplied; re-invoke with authorizer and
    ///   justification
    /// - `NotAnAuthorizer`: the supplied user may not sign off
    ///
    /// Two racing closes serialize on the row update: the loser sees
    /// zero rows affected and fails as already-closed.
    pub async fn close(&self, request: CloseShiftRequest) -> DbResult<Shift> {
        // Shape validation before touching the database
        if let Some(authorizer_id) = &request.authorized_by {
            validate_uuid("authorized_by", authorizer_id).map_err(CoreError::from)?;
            let justification = request.justification.as_deref().unwrap_or("");
            validate_justification(justification).map_err(CoreError::from)?;
        }

        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?1");
        let row: Option<ShiftRow> = sqlx::query_as(&sql)
            .bind(request.shift_id)
            .fetch_optional(&mut *tx)
            .await?;
        let row = row.ok_or(CoreError::ShiftNotFound(request.shift_id))?;

        if row.status == ShiftStatus::Closed {
            return Err(CoreError::ShiftAlreadyClosed(request.shift_id).into());
        }

        // Aggregate everything inside the transaction: the figures we
        // compute are the figures we persist
        let sales = sales_totals(&mut tx, request.shift_id).await?;
        let expenses = drawer::expenses_total(&mut tx, request.shift_id).await?;
        let commissions_paid = commission::paid_total(&mut tx, request.shift_id).await?;
        let vouchers_recorded = drawer::vouchers_total(&mut tx, request.shift_id).await?;
        let transfers_recorded = drawer::transfers_total(&mut tx, request.shift_id).await?;
        let deposits_recorded = drawer::deposits_total(&mut tx, request.shift_id).await?;

        let closing_total = request.closing.total();

        let reconciliation = Reconciliation::compute(&CloseInput {
            opening_total: Money::from_centavos(row.opening_total_centavos),
            closing_total,
            sales,
            expenses,
            commissions_paid,
            vouchers_recorded,
            transfers_recorded,
        });

        if reconciliation.requires_authorization {
            let authorizer_id = match &request.authorized_by {
                None => {
                    return Err(CoreError::AuthorizationRequired {
                        cash_variance_centavos: reconciliation.cash_variance.centavos(),
                        voucher_variance_centavos: reconciliation.voucher_variance.centavos(),
                        transfer_variance_centavos: reconciliation.transfer_variance.centavos(),
                    }
                    .into())
                }
                Some(id) => id,
            };

            match user::fetch(&mut tx, authorizer_id).await? {
                Some(authorizer) if authorizer.is_active && authorizer.can_authorize => {
                    warn!(
                        shift_id = request.shift_id,
                        authorizer = %authorizer_id,
                        cash_variance = %reconciliation.cash_variance,
                        voucher_variance = %reconciliation.voucher_variance,
                        transfer_variance = %reconciliation.transfer_variance,
                        "Out-of-tolerance close authorized"
                    );
                }
                Some(_) | None => {
                    return Err(CoreError::NotAnAuthorizer {
                        user_id: authorizer_id.clone(),
                    }
                    .into())
                }
            }
        }

        let now = Utc::now();
        let closing_blob = serde_json::to_string(&request.closing)?;
        let w = &reconciliation.withholdings;

        // Authorization fields are stamped only when the gate applied
        let (authorized_by, justification, authorized_at) = if reconciliation.requires_authorization
        {
            (
                request.authorized_by.clone(),
                request.justification.clone(),
                Some(now),
            )
        } else {
            (None, None, None)
        };

        let updated = sqlx::query(
            "UPDATE shifts SET
                status = 'closed',
                closing_breakdown = ?2,
                closing_total_centavos = ?3,
                sales_count = ?4,
                sales_cash_centavos = ?5,
                sales_card_centavos = ?6,
                sales_transfer_centavos = ?7,
                sales_deposit_centavos = ?8,
                sales_total_centavos = ?9,
                expenses_total_centavos = ?10,
                commissions_paid_centavos = ?11,
                vouchers_recorded_centavos = ?12,
                transfers_recorded_centavos = ?13,
                deposits_recorded_centavos = ?14,
                tax_cash_centavos = ?15,
                tax_transfer_centavos = ?16,
                tax_deposit_centavos = ?17,
                card_commission_centavos = ?18,
                tax_card_centavos = ?19,
                net_sales_centavos = ?20,
                amount_to_deposit_centavos = ?21,
                expected_cash_centavos = ?22,
                cash_variance_centavos = ?23,
                voucher_variance_centavos = ?24,
                transfer_variance_centavos = ?25,
                requires_authorization = ?26,
                authorized_by = ?27,
                justification = ?28,
                authorized_at = ?29,
                observations = ?30,
                closed_at = ?31
             WHERE id = ?1 AND status = 'open'",
        )
        .bind(request.shift_id)
        .bind(&closing_blob)
        .bind(closing_total.centavos())
        .bind(sales.count)
        .bind(sales.cash.centavos())
        .bind(sales.card.centavos())
        .bind(sales.transfer.centavos())
        .bind(sales.deposit.centavos())
        .bind(sales.total().centavos())
        .bind(expenses.centavos())
        .bind(commissions_paid.centavos())
        .bind(vouchers_recorded.centavos())
        .bind(transfers_recorded.centavos())
        .bind(deposits_recorded.centavos())
        .bind(w.tax_cash.centavos())
        .bind(w.tax_transfer.centavos())
        .bind(w.tax_deposit.centavos())
        .bind(w.card_commission.centavos())
        .bind(w.tax_card.centavos())
        .bind(reconciliation.net_sales.centavos())
        .bind(reconciliation.amount_to_deposit.centavos())
        .bind(reconciliation.expected_cash.centavos())
        .bind(reconciliation.cash_variance.centavos())
        .bind(reconciliation.voucher_variance.centavos())
        .bind(reconciliation.transfer_variance.centavos())
        .bind(reconciliation.requires_authorization)
        .bind(&authorized_by)
        .bind(&justification)
        .bind(authorized_at)
        .bind(&request.observations)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // A racing close got there first
            return Err(CoreError::ShiftAlreadyClosed(request.shift_id).into());
        }

        let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?1");
        let closed: ShiftRow = sqlx::query_as(&sql)
            .bind(request.shift_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            shift_id = request.shift_id,
            closing_total = %closing_total,
            expected_cash = %reconciliation.expected_cash,
            cash_variance = %reconciliation.cash_variance,
            authorized = reconciliation.requires_authorization,
            "Shift closed"
        );

        closed.try_into()
    }
}

// =============================================================================
// Aggregation (shared with sale/drawer/commission repositories)
// =============================================================================

/// Verifies a shift exists and is open (records may only attach to an
/// open shift).
pub(crate) async fn ensure_open(conn: &mut SqliteConnection, shift_id: i64) -> DbResult<()> {
    let status: Option<ShiftStatus> =
        sqlx::query_scalar("SELECT status FROM shifts WHERE id = ?1")
            .bind(shift_id)
            .fetch_optional(conn)
            .await?;

    match status {
        None => Err(CoreError::ShiftNotFound(shift_id).into()),
        Some(ShiftStatus::Closed) => Err(CoreError::ShiftAlreadyClosed(shift_id).into()),
        Some(ShiftStatus::Open) => Ok(()),
    }
}

/// Sums a shift's committed sales by payment method.
///
/// Reads the tender rows of non-voided sales, so a mixed sale contributes
/// exactly its recorded per-method amounts and the grand total counts
/// nothing twice. Re-runnable at any time; always reflects current
/// committed state.
pub(crate) async fn sales_totals(
    conn: &mut SqliteConnection,
    shift_id: i64,
) -> DbResult<SalesTotals> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sales WHERE shift_id = ?1 AND status != 'voided'",
    )
    .bind(shift_id)
    .fetch_one(&mut *conn)
    .await?;

    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT t.method, COALESCE(SUM(t.amount_centavos), 0)
         FROM sale_tenders t
         JOIN sales s ON s.id = t.sale_id
         WHERE s.shift_id = ?1 AND s.status != 'voided'
         GROUP BY t.method",
    )
    .bind(shift_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut totals = SalesTotals {
        count,
        ..SalesTotals::zero()
    };

    for (method, amount_centavos) in rows {
        let amount = Money::from_centavos(amount_centavos);
        match method.as_str() {
            "cash" => totals.cash = amount,
            "card" => totals.card = amount,
            "transfer" => totals.transfer = amount,
            "deposit" => totals.deposit = amount,
            other => {
                // The CHECK constraint makes this unreachable; skip rather
                // than silently mis-bucket
                warn!(method = %other, shift_id, "Skipping tender rows with unknown method");
            }
        }
    }

    Ok(totals)
}
