//! Moderation log persistence.
//!
//! Records are append-only. "Is this user muted/warned/banned" is answered by
//! the projection queries here, never by a stored level field.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::models::{ModerationKind, ModerationRecord};
use crate::Result;

/// Append a moderation record. Returns the new row id.
///
/// `expires_in` stamps a relative expiry for time-bounded records (mutes);
/// pass `None` for records without one.
pub async fn append_record(
    pool: &SqlitePool,
    chat_id: i64,
    user_id: i64,
    kind: ModerationKind,
    expires_in: Option<Duration>,
    reason: &str,
    admin_id: Option<i64>,
) -> Result<i64> {
    // A NULL modifier makes datetime() return NULL, i.e. no expiry.
    let modifier = expires_in.map(|ttl| format!("+{} seconds", ttl.as_secs()));
    let result = sqlx::query(
        r#"
        INSERT INTO moderations (chat_id, user_id, kind, expires, reason, admin_id)
        VALUES (?, ?, ?, datetime('now', ?), ?, ?)
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(kind)
    .bind(modifier)
    .bind(reason)
    .bind(admin_id)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Number of warn records for (chat, user).
pub async fn warn_count(pool: &SqlitePool, chat_id: i64, user_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM moderations
        WHERE chat_id = ? AND user_id = ? AND kind = 'warn'
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Whether a ban record exists for (chat, user).
pub async fn has_ban(pool: &SqlitePool, chat_id: i64, user_id: i64) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM moderations
        WHERE chat_id = ? AND user_id = ? AND kind = 'ban'
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// The newest unexpired mute for (chat, user), if any.
pub async fn active_mute(
    pool: &SqlitePool,
    chat_id: i64,
    user_id: i64,
) -> Result<Option<ModerationRecord>> {
    let record = sqlx::query_as::<_, ModerationRecord>(
        r#"
        SELECT id, chat_id, user_id, kind, expires, reason, admin_id, created
        FROM moderations
        WHERE chat_id = ? AND user_id = ? AND kind = 'mute'
          AND expires IS NOT NULL AND expires > datetime('now')
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Whether an unexpired ignore record exists for (chat, user).
pub async fn has_ignore(pool: &SqlitePool, chat_id: i64, user_id: i64) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM moderations
        WHERE chat_id = ? AND user_id = ? AND kind = 'ignore'
          AND (expires IS NULL OR expires > datetime('now'))
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Full moderation history for (chat, user), oldest first.
pub async fn records_for(
    pool: &SqlitePool,
    chat_id: i64,
    user_id: i64,
) -> Result<Vec<ModerationRecord>> {
    let rows = sqlx::query_as::<_, ModerationRecord>(
        r#"
        SELECT id, chat_id, user_id, kind, expires, reason, admin_id, created
        FROM moderations
        WHERE chat_id = ? AND user_id = ?
        ORDER BY id
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Count records of one kind for (chat, user).
pub async fn count_of_kind(
    pool: &SqlitePool,
    chat_id: i64,
    user_id: i64,
    kind: ModerationKind,
) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM moderations
        WHERE chat_id = ? AND user_id = ? AND kind = ?
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(kind)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Remove all records of one kind for (chat, user).
///
/// Administrative override only; the engine itself never removes records.
pub async fn delete_records(
    pool: &SqlitePool,
    chat_id: i64,
    user_id: i64,
    kind: ModerationKind,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM moderations
        WHERE chat_id = ? AND user_id = ? AND kind = ?
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(kind)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
