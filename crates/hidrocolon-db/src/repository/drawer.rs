//! # Drawer Record Repository
//!
//! The flat per-shift records that feed reconciliation: cash expenses,
//! card voucher slips, bank transfer receipts and bank deposit slips.
//!
//! ## No Running Counters
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  The shift row carries NO live totals for these records.           │
//! │                                                                     │
//! │  Every total is recomputed on demand:                               │
//! │    SELECT COALESCE(SUM(amount_centavos), 0) WHERE shift_id = ?      │
//! │                                                                     │
//! │  A counter incremented at each call site drifts from its records    │
//! │  the first time one caller forgets; a SUM cannot drift.             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::shift;
use hidrocolon_core::validation::{validate_description, validate_positive_amount};
use hidrocolon_core::{BankDeposit, BankTransfer, CardVoucher, CoreError, Expense, Money};

/// Repository for per-shift drawer records.
#[derive(Debug, Clone)]
pub struct DrawerRepository {
    pool: SqlitePool,
}

impl DrawerRepository {
    /// Creates a new DrawerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DrawerRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Expenses
    // -------------------------------------------------------------------------

    /// Records a cash expense against an open shift.
    pub async fn record_expense(
        &self,
        shift_id: i64,
        amount: Money,
        description: &str,
    ) -> DbResult<Expense> {
        validate_positive_amount("amount", amount).map_err(CoreError::from)?;
        validate_description(description).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;
        shift::ensure_open(&mut tx, shift_id).await?;

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            shift_id,
            amount_centavos: amount.centavos(),
            description: description.trim().to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO expenses (id, shift_id, amount_centavos, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&expense.id)
        .bind(expense.shift_id)
        .bind(expense.amount_centavos)
        .bind(&expense.description)
        .bind(expense.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(shift_id, amount = %amount, "Expense recorded");
        Ok(expense)
    }

    /// Gets all expenses for a shift.
    pub async fn list_expenses(&self, shift_id: i64) -> DbResult<Vec<Expense>> {
        let expenses: Vec<Expense> = sqlx::query_as(
            "SELECT id, shift_id, amount_centavos, description, created_at
             FROM expenses WHERE shift_id = ?1 ORDER BY created_at",
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    // -------------------------------------------------------------------------
    // Card vouchers
    // -------------------------------------------------------------------------

    /// Records a card voucher slip against an open shift.
    pub async fn record_voucher(
        &self,
        shift_id: i64,
        amount: Money,
        voucher_number: Option<&str>,
    ) -> DbResult<CardVoucher> {
        validate_positive_amount("amount", amount).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;
        shift::ensure_open(&mut tx, shift_id).await?;

        let voucher = CardVoucher {
            id: Uuid::new_v4().to_string(),
            shift_id,
            amount_centavos: amount.centavos(),
            voucher_number: voucher_number.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO card_vouchers (id, shift_id, amount_centavos, voucher_number, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&voucher.id)
        .bind(voucher.shift_id)
        .bind(voucher.amount_centavos)
        .bind(&voucher.voucher_number)
        .bind(voucher.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(shift_id, amount = %amount, "Card voucher recorded");
        Ok(voucher)
    }

    /// Gets all card vouchers for a shift.
    pub async fn list_vouchers(&self, shift_id: i64) -> DbResult<Vec<CardVoucher>> {
        let vouchers: Vec<CardVoucher> = sqlx::query_as(
            "SELECT id, shift_id, amount_centavos, voucher_number, created_at
             FROM card_vouchers WHERE shift_id = ?1 ORDER BY created_at",
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(vouchers)
    }

    // -------------------------------------------------------------------------
    // Bank transfers
    // -------------------------------------------------------------------------

    /// Records a bank transfer receipt against an open shift.
    pub async fn record_transfer(
        &self,
        shift_id: i64,
        amount: Money,
        reference: Option<&str>,
    ) -> DbResult<BankTransfer> {
        validate_positive_amount("amount", amount).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;
        shift::ensure_open(&mut tx, shift_id).await?;

        let transfer = BankTransfer {
            id: Uuid::new_v4().to_string(),
            shift_id,
            amount_centavos: amount.centavos(),
            reference: reference.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO bank_transfers (id, shift_id, amount_centavos, reference, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&transfer.id)
        .bind(transfer.shift_id)
        .bind(transfer.amount_centavos)
        .bind(&transfer.reference)
        .bind(transfer.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(shift_id, amount = %amount, "Bank transfer recorded");
        Ok(transfer)
    }

    /// Gets all bank transfers for a shift.
    pub async fn list_transfers(&self, shift_id: i64) -> DbResult<Vec<BankTransfer>> {
        let transfers: Vec<BankTransfer> = sqlx::query_as(
            "SELECT id, shift_id, amount_centavos, reference, created_at
             FROM bank_transfers WHERE shift_id = ?1 ORDER BY created_at",
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transfers)
    }

    // -------------------------------------------------------------------------
    // Bank deposits
    // -------------------------------------------------------------------------

    /// Records a bank deposit slip against an open shift.
    pub async fn record_deposit(
        &self,
        shift_id: i64,
        amount: Money,
        slip_number: Option<&str>,
    ) -> DbResult<BankDeposit> {
        validate_positive_amount("amount", amount).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;
        shift::ensure_open(&mut tx, shift_id).await?;

        let deposit = BankDeposit {
            id: Uuid::new_v4().to_string(),
            shift_id,
            amount_centavos: amount.centavos(),
            slip_number: slip_number.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO bank_deposits (id, shift_id, amount_centavos, slip_number, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&deposit.id)
        .bind(deposit.shift_id)
        .bind(deposit.amount_centavos)
        .bind(&deposit.slip_number)
        .bind(deposit.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(shift_id, amount = %amount, "Bank deposit recorded");
        Ok(deposit)
    }

    /// Gets all bank deposits for a shift.
    pub async fn list_deposits(&self, shift_id: i64) -> DbResult<Vec<BankDeposit>> {
        let deposits: Vec<BankDeposit> = sqlx::query_as(
            "SELECT id, shift_id, amount_centavos, slip_number, created_at
             FROM bank_deposits WHERE shift_id = ?1 ORDER BY created_at",
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(deposits)
    }
}

// =============================================================================
// Aggregation helpers (shared with shift close/summary)
// =============================================================================

async fn sum_for_shift(
    conn: &mut SqliteConnection,
    table: &str,
    shift_id: i64,
) -> DbResult<Money> {
    // table is one of our fixed record tables, never caller input
    let sql = format!("SELECT COALESCE(SUM(amount_centavos), 0) FROM {table} WHERE shift_id = ?1");
    let total: i64 = sqlx::query_scalar(&sql)
        .bind(shift_id)
        .fetch_one(conn)
        .await?;

    Ok(Money::from_centavos(total))
}

/// Total cash expenses for a shift.
pub(crate) async fn expenses_total(conn: &mut SqliteConnection, shift_id: i64) -> DbResult<Money> {
    sum_for_shift(conn, "expenses", shift_id).await
}

/// Total recorded card vouchers for a shift.
pub(crate) async fn vouchers_total(conn: &mut SqliteConnection, shift_id: i64) -> DbResult<Money> {
    sum_for_shift(conn, "card_vouchers", shift_id).await
}

/// Total recorded bank transfers for a shift.
pub(crate) async fn transfers_total(conn: &mut SqliteConnection, shift_id: i64) -> DbResult<Money> {
    sum_for_shift(conn, "bank_transfers", shift_id).await
}

/// Total recorded bank deposits for a shift.
pub(crate) async fn deposits_total(conn: &mut SqliteConnection, shift_id: i64) -> DbResult<Money> {
    sum_for_shift(conn, "bank_deposits", shift_id).await
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use crate::repository::user::new_user;
    use hidrocolon_core::CashBreakdown;

    async fn db_with_open_shift() -> (Database, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let operator = uuid::Uuid::new_v4().to_string();
        db.users()
            .insert(&new_user(&operator, "cajero", "Cajero", false))
            .await
            .unwrap();
        let shift = db
            .shifts()
            .open(&operator, CashBreakdown::new())
            .await
            .unwrap();
        (db, shift.id)
    }

    #[tokio::test]
    async fn test_record_and_sum_expenses() {
        let (db, shift_id) = db_with_open_shift().await;

        db.drawer()
            .record_expense(shift_id, Money::from_centavos(1500), "Agua pura")
            .await
            .unwrap();
        db.drawer()
            .record_expense(shift_id, Money::from_centavos(2500), "Papelería")
            .await
            .unwrap();

        let expenses = db.drawer().list_expenses(shift_id).await.unwrap();
        assert_eq!(expenses.len(), 2);

        let mut conn = db.pool().acquire().await.unwrap();
        let total = expenses_total(&mut conn, shift_id).await.unwrap();
        assert_eq!(total.centavos(), 4000);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let (db, shift_id) = db_with_open_shift().await;

        let err = db
            .drawer()
            .record_expense(shift_id, Money::zero(), "Nada")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));
    }

    #[tokio::test]
    async fn test_rejects_unknown_shift() {
        let (db, _) = db_with_open_shift().await;

        let err = db
            .drawer()
            .record_expense(999, Money::from_centavos(100), "Fantasma")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ShiftNotFound(999))
        ));
    }
}
