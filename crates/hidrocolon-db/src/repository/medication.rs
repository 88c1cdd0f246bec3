//! # Medication Repository
//!
//! The catalog slice sale creation depends on: price and commission
//! snapshots, and a stock count whose decrement is guarded in SQL.
//!
//! ## Guarded Stock Decrement
//! ```text
//! UPDATE medications SET stock = stock - :qty
//! WHERE id = :id AND stock >= :qty
//! ```
//! Zero rows affected means insufficient stock, and the surrounding sale
//! transaction rolls back as a whole. The check and the decrement are one
//! statement, so no concurrent sale can sneak between them.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use hidrocolon_core::Medication;

const MEDICATION_COLUMNS: &str =
    "id, code, name, price_centavos, commission_rate_bps, stock, is_active, created_at, updated_at";

/// Repository for medication catalog operations.
#[derive(Debug, Clone)]
pub struct MedicationRepository {
    pool: SqlitePool,
}

impl MedicationRepository {
    /// Creates a new MedicationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MedicationRepository { pool }
    }

    /// Inserts a medication.
    pub async fn insert(&self, medication: &Medication) -> DbResult<()> {
        debug!(id = %medication.id, code = %medication.code, "Inserting medication");

        sqlx::query(
            "INSERT INTO medications (
                id, code, name, price_centavos, commission_rate_bps,
                stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&medication.id)
        .bind(&medication.code)
        .bind(&medication.name)
        .bind(medication.price_centavos)
        .bind(medication.commission_rate_bps)
        .bind(medication.stock)
        .bind(medication.is_active)
        .bind(medication.created_at)
        .bind(medication.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a medication by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Medication>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Gets a medication by catalog code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Medication>> {
        let sql = format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE code = ?1");
        let medication: Option<Medication> = sqlx::query_as(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(medication)
    }

    /// Sets the absolute stock level (receiving inventory, corrections).
    pub async fn set_stock(&self, id: &str, stock: i64) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query("UPDATE medications SET stock = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(stock)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Fetches a medication on an existing connection (sale transaction).
pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Medication>> {
    let sql = format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE id = ?1");
    let medication: Option<Medication> =
        sqlx::query_as(&sql).bind(id).fetch_optional(conn).await?;

    Ok(medication)
}

/// Decrements stock if enough is available. Returns false when the guard
/// rejected the decrement (insufficient stock).
pub(crate) async fn decrement_stock(
    conn: &mut SqliteConnection,
    id: &str,
    quantity: i64,
) -> DbResult<bool> {
    let now = Utc::now();

    let result = sqlx::query(
        "UPDATE medications SET stock = stock - ?2, updated_at = ?3
         WHERE id = ?1 AND stock >= ?2",
    )
    .bind(id)
    .bind(quantity)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns stock to the shelf (sale void).
pub(crate) async fn restock(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<()> {
    let now = Utc::now();

    sqlx::query(
        "UPDATE medications SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1",
    )
    .bind(id)
    .bind(quantity)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

/// Builds a medication record with generated timestamps (seed/test helper).
pub fn new_medication(
    id: &str,
    code: &str,
    name: &str,
    price_centavos: i64,
    commission_rate_bps: u32,
    stock: i64,
) -> Medication {
    let now = Utc::now();
    Medication {
        id: id.to_string(),
        code: code.to_string(),
        name: name.to_string(),
        price_centavos,
        commission_rate_bps,
        stock,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = Uuid::new_v4().to_string();

        db.medications()
            .insert(&new_medication(&id, "AMOX-500", "Amoxicilina 500mg", 2500, 1000, 30))
            .await
            .unwrap();

        let med = db.medications().get_by_code("AMOX-500").await.unwrap().unwrap();
        assert_eq!(med.id, id);
        assert_eq!(med.price_centavos, 2500);
        assert_eq!(med.stock, 30);
    }

    #[tokio::test]
    async fn test_guarded_decrement() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = Uuid::new_v4().to_string();

        db.medications()
            .insert(&new_medication(&id, "IBU-400", "Ibuprofeno 400mg", 150, 0, 5))
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(decrement_stock(&mut conn, &id, 3).await.unwrap());
        // Only 2 left, the guard refuses
        assert!(!decrement_stock(&mut conn, &id, 3).await.unwrap());
        drop(conn);

        let med = db.medications().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(med.stock, 2);
    }
}
