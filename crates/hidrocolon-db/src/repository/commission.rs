//! # Commission Repository
//!
//! Doctor commission accrual and batch payout.
//!
//! ## Payout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Commission Payout                                │
//! │                                                                     │
//! │  1. Sale lines accrue commission_centavos for the attending doctor  │
//! │     (commission_payment_id stays NULL)                              │
//! │                                                                     │
//! │  2. pay(doctor, cutoff) in ONE transaction:                         │
//! │     ├── sum + count the doctor's unpaid lines up to the cutoff      │
//! │     │   (lines of voided sales never qualify)                       │
//! │     ├── insert the commission_payments row                          │
//! │     └── stamp every aggregated line with the payment id             │
//! │                                                                     │
//! │  3. A stamped line is settled forever; re-running pay() finds       │
//! │     nothing and fails with NoUnpaidCommissions                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Partial marking is never observable: the insert and the stamping
//! commit together or not at all.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::shift;
use hidrocolon_core::validation::validate_uuid;
use hidrocolon_core::{CommissionPayment, CoreError, Doctor, Money};

/// One unpaid commission line, as shown to the payout screen.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommissionLine {
    pub sale_item_id: String,
    pub sale_id: String,
    pub name_snapshot: String,
    pub amount_centavos: i64,
}

/// Repository for commission accrual queries and payouts.
#[derive(Debug, Clone)]
pub struct CommissionRepository {
    pool: SqlitePool,
}

impl CommissionRepository {
    /// Creates a new CommissionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CommissionRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Doctors
    // -------------------------------------------------------------------------

    /// Inserts a doctor.
    pub async fn insert_doctor(&self, doctor: &Doctor) -> DbResult<()> {
        debug!(id = %doctor.id, name = %doctor.name, "Inserting doctor");

        sqlx::query(
            "INSERT INTO doctors (id, name, is_active, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&doctor.id)
        .bind(&doctor.name)
        .bind(doctor.is_active)
        .bind(doctor.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a doctor by ID.
    pub async fn get_doctor(&self, id: &str) -> DbResult<Option<Doctor>> {
        let doctor: Option<Doctor> =
            sqlx::query_as("SELECT id, name, is_active, created_at FROM doctors WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(doctor)
    }

    // -------------------------------------------------------------------------
    // Accrual queries
    // -------------------------------------------------------------------------

    /// Lists a doctor's unpaid commission lines up to the cutoff date.
    ///
    /// Lines belonging to voided sales are excluded: a voided sale owes
    /// nobody anything.
    pub async fn unpaid_lines(
        &self,
        doctor_id: &str,
        cutoff: NaiveDate,
    ) -> DbResult<Vec<CommissionLine>> {
        let lines: Vec<CommissionLine> = sqlx::query_as(
            "SELECT si.id AS sale_item_id, si.sale_id, si.name_snapshot,
                    si.commission_centavos AS amount_centavos
             FROM sale_items si
             JOIN sales s ON s.id = si.sale_id
             WHERE si.doctor_id = ?1
               AND si.commission_payment_id IS NULL
               AND si.commission_centavos > 0
               AND s.status != 'voided'
               AND date(si.created_at) <= ?2
             ORDER BY si.created_at",
        )
        .bind(doctor_id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Total unpaid commission for a doctor up to the cutoff date.
    pub async fn unpaid_total(&self, doctor_id: &str, cutoff: NaiveDate) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(si.commission_centavos), 0)
             FROM sale_items si
             JOIN sales s ON s.id = si.sale_id
             WHERE si.doctor_id = ?1
               AND si.commission_payment_id IS NULL
               AND si.commission_centavos > 0
               AND s.status != 'voided'
               AND date(si.created_at) <= ?2",
        )
        .bind(doctor_id)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_centavos(total))
    }

    // -------------------------------------------------------------------------
    // Payout
    // -------------------------------------------------------------------------

    /// Pays out a doctor's accrued commissions up to the cutoff date.
    ///
    /// ## Arguments
    /// * `doctor_id` - Doctor being paid
    /// * `cutoff` - Lines created on or before this date are settled
    /// * `shift_id` - The open shift whose drawer funds the payout, when
    ///   paid in cash from the register; None for payouts made outside a
    ///   shift (e.g. by bank transfer from the office)
    pub async fn pay(
        &self,
        doctor_id: &str,
        cutoff: NaiveDate,
        shift_id: Option<i64>,
    ) -> DbResult<CommissionPayment> {
        validate_uuid("doctor_id", doctor_id).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let doctor_exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM doctors WHERE id = ?1")
                .bind(doctor_id)
                .fetch_optional(&mut *tx)
                .await?;
        if doctor_exists.is_none() {
            return Err(CoreError::DoctorNotFound(doctor_id.to_string()).into());
        }

        // A drawer-funded payout needs its shift open: close freezes the
        // commissions-paid total
        if let Some(shift_id) = shift_id {
            shift::ensure_open(&mut tx, shift_id).await?;
        }

        let (total_centavos, line_count): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(si.commission_centavos), 0), COUNT(*)
             FROM sale_items si
             JOIN sales s ON s.id = si.sale_id
             WHERE si.doctor_id = ?1
               AND si.commission_payment_id IS NULL
               AND si.commission_centavos > 0
               AND s.status != 'voided'
               AND date(si.created_at) <= ?2",
        )
        .bind(doctor_id)
        .bind(cutoff)
        .fetch_one(&mut *tx)
        .await?;

        if line_count == 0 {
            return Err(CoreError::NoUnpaidCommissions {
                doctor_id: doctor_id.to_string(),
            }
            .into());
        }

        let payment = CommissionPayment {
            id: Uuid::new_v4().to_string(),
            doctor_id: doctor_id.to_string(),
            shift_id,
            cutoff_date: cutoff,
            total_centavos,
            line_count,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO commission_payments (
                id, doctor_id, shift_id, cutoff_date, total_centavos, line_count, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&payment.id)
        .bind(&payment.doctor_id)
        .bind(payment.shift_id)
        .bind(payment.cutoff_date)
        .bind(payment.total_centavos)
        .bind(payment.line_count)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        // Stamp the exact lines the sum above aggregated: same predicate,
        // same transaction, same snapshot
        sqlx::query(
            "UPDATE sale_items SET commission_payment_id = ?1
             WHERE doctor_id = ?2
               AND commission_payment_id IS NULL
               AND commission_centavos > 0
               AND date(created_at) <= ?3
               AND sale_id IN (SELECT id FROM sales WHERE status != 'voided')",
        )
        .bind(&payment.id)
        .bind(doctor_id)
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            doctor_id,
            total = %payment.total(),
            lines = line_count,
            "Commission payout created"
        );

        Ok(payment)
    }

    /// Gets a payment by ID.
    pub async fn get_payment(&self, id: &str) -> DbResult<Option<CommissionPayment>> {
        let payment: Option<CommissionPayment> = sqlx::query_as(
            "SELECT id, doctor_id, shift_id, cutoff_date, total_centavos, line_count, created_at
             FROM commission_payments WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Total commissions paid out of a shift's drawer.
    pub async fn paid_total_for_shift(&self, shift_id: i64) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        paid_total(&mut conn, shift_id).await
    }
}

/// Sums drawer-funded payouts for a shift on an existing connection
/// (shift close reads this inside its own transaction).
pub(crate) async fn paid_total(conn: &mut SqliteConnection, shift_id: i64) -> DbResult<Money> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total_centavos), 0) FROM commission_payments WHERE shift_id = ?1",
    )
    .bind(shift_id)
    .fetch_one(conn)
    .await?;

    Ok(Money::from_centavos(total))
}

/// Builds a doctor record with generated timestamps (seed/test helper).
pub fn new_doctor(id: &str, name: &str) -> Doctor {
    Doctor {
        id: id.to_string(),
        name: name.to_string(),
        is_active: true,
        created_at: Utc::now(),
    }
}
