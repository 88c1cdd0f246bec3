//! # Sale Repository
//!
//! Sale creation against the open shift, and the audited void transition.
//!
//! ## Sale Creation Is One Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      create() transaction                           │
//! │                                                                     │
//! │  1. Find the open shift (none → NoOpenShift)                        │
//! │  2. Read medications, price the lines, accrue commissions           │
//! │  3. Tender sum must equal the priced total (TenderMismatch)         │
//! │  4. INSERT sale                                                     │
//! │  5. Per line: guarded stock decrement + INSERT sale_item            │
//! │     └── insufficient stock → error → WHOLE transaction rolls back   │
//! │  6. INSERT tender rows                                              │
//! │  7. Card/transfer/deposit tenders carrying a reference also insert  │
//! │     their drawer side record (voucher / transfer / deposit)         │
//! │  8. COMMIT                                                          │
//! │                                                                     │
//! │  A failure at ANY step leaves no partial sale, no decremented       │
//! │  stock and no orphaned side records.                                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::medication;
use hidrocolon_core::validation::{
    validate_description, validate_positive_amount, validate_quantity, validate_uuid,
};
use hidrocolon_core::{
    CoreError, Money, PaymentMethod, Sale, SaleItem, SaleStatus, SaleTender, ShiftStatus,
    TenderMethod, ValidationError,
};

// =============================================================================
// Requests
// =============================================================================

/// One line of a sale being created.
#[derive(Debug, Clone)]
pub struct SaleLineRequest {
    pub medication_id: String,
    pub quantity: i64,
    /// Attending doctor; presence makes the line accrue commission.
    pub doctor_id: Option<String>,
}

/// One method's share of the payment.
#[derive(Debug, Clone)]
pub struct TenderRequest {
    pub method: TenderMethod,
    /// For cash: the amount retained (received minus change given).
    pub amount: Money,
    /// Voucher number / transfer reference / deposit slip. When present
    /// on a card, transfer or deposit tender, the matching drawer record
    /// is inserted in the same transaction.
    pub reference: Option<String>,
}

/// Input for sale creation.
#[derive(Debug, Clone)]
pub struct CreateSaleRequest {
    pub items: Vec<SaleLineRequest>,
    pub tenders: Vec<TenderRequest>,
    pub notes: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Create
    // -------------------------------------------------------------------------

    /// Creates a sale against the open shift.
    ///
    /// See the module docs for the transaction shape. The sale's payment
    /// method is derived from the tenders: one tender keeps its method,
    /// several make the sale `Mixed`.
    pub async fn create(&self, request: CreateSaleRequest) -> DbResult<Sale> {
        // Shape validation before touching the database
        if request.items.is_empty() {
            return Err(CoreError::from(ValidationError::Required {
                field: "items".to_string(),
            })
            .into());
        }
        if request.tenders.is_empty() {
            return Err(CoreError::from(ValidationError::Required {
                field: "tenders".to_string(),
            })
            .into());
        }
        for line in &request.items {
            validate_uuid("medication_id", &line.medication_id).map_err(CoreError::from)?;
            validate_quantity(line.quantity).map_err(CoreError::from)?;
            if let Some(doctor_id) = &line.doctor_id {
                validate_uuid("doctor_id", doctor_id).map_err(CoreError::from)?;
            }
        }
        for tender in &request.tenders {
            validate_positive_amount("tender amount", tender.amount).map_err(CoreError::from)?;
        }

        let mut tx = self.pool.begin().await?;

        let shift_id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM shifts WHERE status = 'open' LIMIT 1")
                .fetch_optional(&mut *tx)
                .await?;
        let shift_id = shift_id.ok_or(CoreError::NoOpenShift)?;

        let now = Utc::now();
        let sale_id = Uuid::new_v4().to_string();

        // Price the lines from the catalog before writing anything
        let mut total = Money::zero();
        let mut items: Vec<SaleItem> = Vec::with_capacity(request.items.len());

        for line in &request.items {
            let med = medication::fetch(&mut tx, &line.medication_id)
                .await?
                .filter(|m| m.is_active)
                .ok_or_else(|| CoreError::MedicationNotFound(line.medication_id.clone()))?;

            if let Some(doctor_id) = &line.doctor_id {
                let doctor_exists: Option<i64> =
                    sqlx::query_scalar("SELECT 1 FROM doctors WHERE id = ?1")
                        .bind(doctor_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                if doctor_exists.is_none() {
                    return Err(CoreError::DoctorNotFound(doctor_id.clone()).into());
                }
            }

            let line_total = med.price().multiply_quantity(line.quantity);
            let commission = if line.doctor_id.is_some() {
                line_total.apply_rate(med.commission_rate())
            } else {
                Money::zero()
            };
            total += line_total;

            items.push(SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                medication_id: med.id.clone(),
                code_snapshot: med.code.clone(),
                name_snapshot: med.name.clone(),
                unit_price_centavos: med.price_centavos,
                quantity: line.quantity,
                line_total_centavos: line_total.centavos(),
                doctor_id: line.doctor_id.clone(),
                commission_centavos: commission.centavos(),
                commission_payment_id: None,
                created_at: now,
            });
        }

        // Tenders must decompose the priced total exactly
        let tendered: Money = request.tenders.iter().map(|t| t.amount).sum();
        if tendered != total {
            return Err(CoreError::TenderMismatch {
                total_centavos: total.centavos(),
                tendered_centavos: tendered.centavos(),
            }
            .into());
        }

        let method = if request.tenders.len() == 1 {
            request.tenders[0].method.as_payment_method()
        } else {
            PaymentMethod::Mixed
        };

        let sale = Sale {
            id: sale_id.clone(),
            shift_id,
            method,
            total_centavos: total.centavos(),
            status: SaleStatus::Completed,
            notes: request.notes.clone(),
            voided_by: None,
            voided_at: None,
            void_reason: None,
            created_at: now,
        };

        debug!(sale_id = %sale_id, shift_id, total = %total, "Creating sale");

        sqlx::query(
            "INSERT INTO sales (
                id, shift_id, method, total_centavos, status, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&sale.id)
        .bind(sale.shift_id)
        .bind(sale.method)
        .bind(sale.total_centavos)
        .bind(sale.status)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &items {
            // Stock check and decrement are one guarded statement
            let decremented =
                medication::decrement_stock(&mut tx, &item.medication_id, item.quantity).await?;
            if !decremented {
                let available: i64 =
                    sqlx::query_scalar("SELECT stock FROM medications WHERE id = ?1")
                        .bind(&item.medication_id)
                        .fetch_one(&mut *tx)
                        .await?;
                return Err(CoreError::InsufficientStock {
                    code: item.code_snapshot.clone(),
                    available,
                    requested: item.quantity,
                }
                .into());
            }

            sqlx::query(
                "INSERT INTO sale_items (
                    id, sale_id, medication_id, code_snapshot, name_snapshot,
                    unit_price_centavos, quantity, line_total_centavos,
                    doctor_id, commission_centavos, commission_payment_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.medication_id)
            .bind(&item.code_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_centavos)
            .bind(item.quantity)
            .bind(item.line_total_centavos)
            .bind(&item.doctor_id)
            .bind(item.commission_centavos)
            .bind(&item.commission_payment_id)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for tender in &request.tenders {
            let tender_row = SaleTender {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                method: tender.method,
                amount_centavos: tender.amount.centavos(),
                reference: tender.reference.clone(),
                created_at: now,
            };

            sqlx::query(
                "INSERT INTO sale_tenders (
                    id, sale_id, method, amount_centavos, reference, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&tender_row.id)
            .bind(&tender_row.sale_id)
            .bind(tender_row.method)
            .bind(tender_row.amount_centavos)
            .bind(&tender_row.reference)
            .bind(tender_row.created_at)
            .execute(&mut *tx)
            .await?;

            // Optional side record: the physical slip behind a non-cash
            // tender, recorded with the sale so reconciliation can
            // cross-check recorded slips against tendered amounts
            if tender.reference.is_some() {
                insert_side_record(&mut tx, shift_id, tender, now).await?;
            }
        }

        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            shift_id,
            total = %total,
            ?method,
            items = items.len(),
            "Sale created"
        );

        Ok(sale)
    }

    // -------------------------------------------------------------------------
    // Void
    // -------------------------------------------------------------------------

    /// Voids a completed sale, stamping who, when and why.
    ///
    /// The sale's shift must still be open: close froze the aggregates a
    /// void would change. Stock returns to the shelf in the same
    /// transaction.
    pub async fn void(&self, sale_id: &str, voided_by: &str, reason: &str) -> DbResult<Sale> {
        validate_uuid("sale_id", sale_id).map_err(CoreError::from)?;
        validate_uuid("voided_by", voided_by).map_err(CoreError::from)?;
        validate_description(reason).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let sale = fetch(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        if sale.is_voided() {
            return Err(CoreError::SaleAlreadyVoided(sale_id.to_string()).into());
        }

        let shift_status: ShiftStatus =
            sqlx::query_scalar("SELECT status FROM shifts WHERE id = ?1")
                .bind(sale.shift_id)
                .fetch_one(&mut *tx)
                .await?;
        if shift_status == ShiftStatus::Closed {
            return Err(CoreError::ShiftAlreadyClosed(sale.shift_id).into());
        }

        let voider_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ?1")
            .bind(voided_by)
            .fetch_optional(&mut *tx)
            .await?;
        if voider_exists.is_none() {
            return Err(CoreError::UserNotFound(voided_by.to_string()).into());
        }

        let now = Utc::now();

        let updated = sqlx::query(
            "UPDATE sales SET
                status = 'voided', voided_by = ?2, voided_at = ?3, void_reason = ?4
             WHERE id = ?1 AND status = 'completed'",
        )
        .bind(sale_id)
        .bind(voided_by)
        .bind(now)
        .bind(reason.trim())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // A racing void got there first
            return Err(CoreError::SaleAlreadyVoided(sale_id.to_string()).into());
        }

        // Return the stock the voided sale had taken
        let lines: Vec<(String, i64)> =
            sqlx::query_as("SELECT medication_id, quantity FROM sale_items WHERE sale_id = ?1")
                .bind(sale_id)
                .fetch_all(&mut *tx)
                .await?;
        for (medication_id, quantity) in lines {
            medication::restock(&mut tx, &medication_id, quantity).await?;
        }

        let voided = fetch(&mut tx, sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", sale_id))?;

        tx.commit().await?;

        info!(sale_id, voided_by, "Sale voided");

        Ok(voided)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, sale_id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, sale_id).await
    }

    /// Gets all items for a sale.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items: Vec<SaleItem> = sqlx::query_as(
            "SELECT id, sale_id, medication_id, code_snapshot, name_snapshot,
                    unit_price_centavos, quantity, line_total_centavos,
                    doctor_id, commission_centavos, commission_payment_id, created_at
             FROM sale_items
             WHERE sale_id = ?1
             ORDER BY created_at",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets all tender rows for a sale.
    pub async fn get_tenders(&self, sale_id: &str) -> DbResult<Vec<SaleTender>> {
        let tenders: Vec<SaleTender> = sqlx::query_as(
            "SELECT id, sale_id, method, amount_centavos, reference, created_at
             FROM sale_tenders
             WHERE sale_id = ?1
             ORDER BY created_at",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tenders)
    }

    /// Gets every sale of a shift, voided included (history view).
    pub async fn list_for_shift(&self, shift_id: i64) -> DbResult<Vec<Sale>> {
        let sales: Vec<Sale> = sqlx::query_as(
            "SELECT id, shift_id, method, total_centavos, status, notes,
                    voided_by, voided_at, void_reason, created_at
             FROM sales
             WHERE shift_id = ?1
             ORDER BY created_at",
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Option<Sale>> {
    let sale: Option<Sale> = sqlx::query_as(
        "SELECT id, shift_id, method, total_centavos, status, notes,
                voided_by, voided_at, void_reason, created_at
         FROM sales WHERE id = ?1",
    )
    .bind(sale_id)
    .fetch_optional(conn)
    .await?;

    Ok(sale)
}

/// Inserts the drawer side record behind a non-cash tender.
async fn insert_side_record(
    conn: &mut SqliteConnection,
    shift_id: i64,
    tender: &TenderRequest,
    now: chrono::DateTime<Utc>,
) -> DbResult<()> {
    let (table, number_column) = match tender.method {
        TenderMethod::Card => ("card_vouchers", "voucher_number"),
        TenderMethod::Transfer => ("bank_transfers", "reference"),
        TenderMethod::Deposit => ("bank_deposits", "slip_number"),
        // Cash leaves no slip
        TenderMethod::Cash => return Ok(()),
    };

    let sql = format!(
        "INSERT INTO {table} (id, shift_id, amount_centavos, {number_column}, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)"
    );

    sqlx::query(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(shift_id)
        .bind(tender.amount.centavos())
        .bind(&tender.reference)
        .bind(now)
        .execute(conn)
        .await?;

    Ok(())
}
