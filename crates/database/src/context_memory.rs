//! Conversational context persistence.

use sqlx::SqlitePool;

use crate::models::{ContextEntry, ContextRole};
use crate::Result;

/// Insert a context entry unless the identical (chat, role, content) triple
/// already exists. Returns whether a row was inserted.
pub async fn insert_entry(
    pool: &SqlitePool,
    chat_id: i64,
    role: ContextRole,
    content: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO context_memory (chat_id, role, content)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(chat_id)
    .bind(role)
    .bind(content)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Number of context entries for a chat.
pub async fn count_for_chat(pool: &SqlitePool, chat_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM context_memory
        WHERE chat_id = ?
        "#,
    )
    .bind(chat_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Delete a chat's oldest entries, keeping only the `keep` newest.
pub async fn trim_to(pool: &SqlitePool, chat_id: i64, keep: i64) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM context_memory
        WHERE chat_id = ? AND id NOT IN (
            SELECT id
            FROM context_memory
            WHERE chat_id = ?
            ORDER BY id DESC
            LIMIT ?
        )
        "#,
    )
    .bind(chat_id)
    .bind(chat_id)
    .bind(keep)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// The `limit` most recent entries for a chat, oldest first.
pub async fn recent(pool: &SqlitePool, chat_id: i64, limit: i64) -> Result<Vec<ContextEntry>> {
    let rows = sqlx::query_as::<_, ContextEntry>(
        r#"
        SELECT id, chat_id, role, content, timestamp
        FROM (
            SELECT id, chat_id, role, content, timestamp
            FROM context_memory
            WHERE chat_id = ?
            ORDER BY id DESC
            LIMIT ?
        )
        ORDER BY id
        "#,
    )
    .bind(chat_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Remove all entries for a chat. Returns the number removed.
pub async fn clear_chat(pool: &SqlitePool, chat_id: i64) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM context_memory
        WHERE chat_id = ?
        "#,
    )
    .bind(chat_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
