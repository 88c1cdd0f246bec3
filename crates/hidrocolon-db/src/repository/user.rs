//! # User Repository
//!
//! Lookup operations for operators and authorizers.
//!
//! User management itself (passwords, roles, sessions) is outside this
//! repository; the reconciliation core only needs to know who a user is,
//! whether they are active, and whether they may authorize a close.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use hidrocolon_core::User;

const USER_COLUMNS: &str = "id, username, display_name, can_authorize, is_active, created_at";

/// Repository for user lookups.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Inserts a user.
    pub async fn insert(&self, user: &User) -> DbResult<()> {
        debug!(id = %user.id, username = %user.username, "Inserting user");

        sqlx::query(
            "INSERT INTO users (id, username, display_name, can_authorize, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(user.can_authorize)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a user by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Gets a user by username.
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
        let user: Option<User> = sqlx::query_as(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Deactivates a user (soft delete).
    pub async fn deactivate(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Fetches a user on an existing connection (used inside the shift-close
/// transaction to validate the authorizer against the same snapshot).
pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let user: Option<User> = sqlx::query_as(&sql).bind(id).fetch_optional(conn).await?;

    Ok(user)
}

/// Builds a user record with generated timestamps (seed/test helper).
pub fn new_user(id: &str, username: &str, display_name: &str, can_authorize: bool) -> User {
    User {
        id: id.to_string(),
        username: username.to_string(),
        display_name: display_name.to_string(),
        can_authorize,
        is_active: true,
        created_at: Utc::now(),
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

        db.users()
            .insert(&new_user(&id, "mperez", "María Pérez", true))
            .await
            .unwrap();

        let user = db.users().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(user.username, "mperez");
        assert!(user.can_authorize);

        let by_name = db.users().get_by_username("mperez").await.unwrap();
        assert!(by_name.is_some());
        assert!(db.users().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = Uuid::new_v4().to_string();

        db.users()
            .insert(&new_user(&id, "jlopez", "Juan López", false))
            .await
            .unwrap();

        assert!(db.users().deactivate(&id).await.unwrap());
        let user = db.users().get_by_id(&id).await.unwrap().unwrap();
        assert!(!user.is_active);
    }
}
