//! Database access: pool construction, migrations and small shared helpers
//!
//! The store is SQLite. Handlers that write open one transaction per batch and
//! pass `&mut SqliteConnection` down, so every step of a batch either commits
//! together or not at all.

use chrono::Utc;
use openbis_common::perm_id::generate_perm_id;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    QueryBuilder, Sqlite, SqliteConnection, SqlitePool,
};
use std::{str::FromStr, time::Duration};

use crate::{auth::store_password, config::DatabaseConfig, error::ApiResult};

/// Open a connection pool for the configured database
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(options)
        .await
}

/// Open a private in-memory database.
///
/// The pool keeps exactly one connection alive forever; a second connection
/// would see a different, empty database.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

/// Apply the schema migrations shipped with the workspace
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// Create the instance admin account when the database has no persons yet.
///
/// Returns `true` when the account was created.
pub async fn bootstrap_admin(
    pool: &SqlitePool,
    user_id: &str,
    password: &str,
) -> ApiResult<bool> {
    let persons: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM persons")
        .fetch_one(pool)
        .await?;
    if persons > 0 {
        return Ok(false);
    }

    let mut tx = pool.begin().await?;
    let now = Utc::now();
    let person_id = sqlx::query(
        "INSERT INTO persons (user_id, active, registration_date) VALUES (?, 1, ?)",
    )
    .bind(user_id)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();
    store_password(&mut tx, person_id, password).await?;

    sqlx::query(
        "INSERT INTO role_assignments (role, person_id, registration_date) VALUES ('ADMIN', ?, ?)",
    )
    .bind(person_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(user_id = %user_id, "Bootstrapped instance admin");
    Ok(true)
}

/// Draw the next value of the shared sequence
pub async fn next_sequence(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let id = sqlx::query("INSERT INTO perm_id_sequence (issued_at) VALUES (?)")
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    Ok(id)
}

/// Generate a fresh permanent id
pub async fn next_perm_id(conn: &mut SqliteConnection) -> Result<String, sqlx::Error> {
    let sequence = next_sequence(conn).await?;
    Ok(generate_perm_id(Utc::now(), sequence))
}

/// Append `column IN (?, ?, ...)` to a query under construction
pub fn push_in(builder: &mut QueryBuilder<'_, Sqlite>, column: &str, ids: &[i64]) {
    builder.push(column);
    builder.push(" IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_admin_only_once() {
        let pool = connect_in_memory().await.unwrap();
        migrate(&pool).await.unwrap();

        assert!(bootstrap_admin(&pool, "admin", "secret").await.unwrap());
        assert!(!bootstrap_admin(&pool, "other", "secret").await.unwrap());

        let role: String = sqlx::query_scalar(
            "SELECT r.role FROM role_assignments r JOIN persons p ON p.id = r.person_id WHERE p.user_id = 'admin'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(role, "ADMIN");
    }

    #[tokio::test]
    async fn test_perm_ids_are_unique() {
        let pool = connect_in_memory().await.unwrap();
        migrate(&pool).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = next_perm_id(&mut conn).await.unwrap();
        let second = next_perm_id(&mut conn).await.unwrap();
        assert_ne!(first, second);
        assert!(openbis_common::perm_id::is_perm_id(&first));
    }
}
