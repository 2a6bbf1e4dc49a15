//! Per-day activity counters.

use sqlx::SqlitePool;

use crate::Result;

/// Count one message for (user, chat) on today's date.
pub async fn record_message(pool: &SqlitePool, user_id: i64, chat_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO activity (user_id, chat_id, date, messages)
        VALUES (?, ?, date('now'), 1)
        ON CONFLICT(user_id, chat_id, date) DO UPDATE SET
            messages = messages + 1
        "#,
    )
    .bind(user_id)
    .bind(chat_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Message count for (user, chat) on a given date (`YYYY-MM-DD`).
pub async fn messages_on(
    pool: &SqlitePool,
    user_id: i64,
    chat_id: i64,
    date: &str,
) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(messages), 0)
        FROM activity
        WHERE user_id = ? AND chat_id = ? AND date = ?
        "#,
    )
    .bind(user_id)
    .bind(chat_id)
    .bind(date)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Most active users in a chat on a given date, as (user_id, messages).
pub async fn top_for_chat(
    pool: &SqlitePool,
    chat_id: i64,
    date: &str,
    limit: i64,
) -> Result<Vec<(i64, i64)>> {
    let rows = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT user_id, messages
        FROM activity
        WHERE chat_id = ? AND date = ?
        ORDER BY messages DESC, user_id
        LIMIT ?
        "#,
    )
    .bind(chat_id)
    .bind(date)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
