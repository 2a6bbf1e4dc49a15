//! User persistence.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::User;

/// Ensure a user row exists for the given id.
///
/// Used on first observed message, when only the id is known. Does nothing
/// if the user already exists.
pub async fn ensure_user(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO users (id)
        VALUES (?)
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Create or refresh a user with display metadata.
pub async fn observe_user(
    pool: &SqlitePool,
    id: i64,
    username: Option<&str>,
    first_name: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, username, first_name)
        VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            username = excluded.username,
            first_name = excluded.first_name
        "#,
    )
    .bind(id)
    .bind(username)
    .bind(first_name)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a user by id.
pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, first_name, created_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "User",
        id: id.to_string(),
    })
}

/// Count total users.
pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM users
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}
