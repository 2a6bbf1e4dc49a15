//! Chat message log persistence.
//!
//! The log is append-only: the moderation heuristics and the ad scheduler's
//! active-chat snapshot both read from it, nothing rewrites it.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::models::{ChatMessage, MessageType};
use crate::Result;

/// Append a message to the log. Returns the new row id.
pub async fn append_message(
    pool: &SqlitePool,
    chat_id: i64,
    user_id: i64,
    text: &str,
    message_type: MessageType,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO chat_history (chat_id, user_id, text, message_type)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(text)
    .bind(message_type)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Types of a user's most recent messages in a chat, newest first.
pub async fn recent_types(
    pool: &SqlitePool,
    chat_id: i64,
    user_id: i64,
    limit: i64,
) -> Result<Vec<MessageType>> {
    let types = sqlx::query_scalar::<_, MessageType>(
        r#"
        SELECT message_type
        FROM chat_history
        WHERE chat_id = ? AND user_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(types)
}

/// Texts of a user's most recent messages in a chat, newest first.
pub async fn recent_texts(
    pool: &SqlitePool,
    chat_id: i64,
    user_id: i64,
    limit: i64,
) -> Result<Vec<String>> {
    let texts = sqlx::query_scalar::<_, String>(
        r#"
        SELECT text
        FROM chat_history
        WHERE chat_id = ? AND user_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(texts)
}

/// A user's most recent messages in a chat, newest first.
pub async fn recent_messages(
    pool: &SqlitePool,
    chat_id: i64,
    user_id: i64,
    limit: i64,
) -> Result<Vec<ChatMessage>> {
    let rows = sqlx::query_as::<_, ChatMessage>(
        r#"
        SELECT id, chat_id, user_id, text, message_type, timestamp
        FROM chat_history
        WHERE chat_id = ? AND user_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Distinct chats with at least one logged message inside the window.
///
/// This is the snapshot the ad scheduler targets at task creation.
pub async fn active_chats_since(pool: &SqlitePool, window: Duration) -> Result<Vec<i64>> {
    let modifier = format!("-{} seconds", window.as_secs());
    let chats = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT DISTINCT chat_id
        FROM chat_history
        WHERE timestamp >= datetime('now', ?)
        ORDER BY chat_id
        "#,
    )
    .bind(modifier)
    .fetch_all(pool)
    .await?;

    Ok(chats)
}

/// Prune log entries older than the specified TTL.
pub async fn prune_older_than(pool: &SqlitePool, ttl: Duration) -> Result<u64> {
    let modifier = format!("-{} seconds", ttl.as_secs());
    let result = sqlx::query(
        r#"
        DELETE FROM chat_history
        WHERE timestamp < datetime('now', ?)
        "#,
    )
    .bind(modifier)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
