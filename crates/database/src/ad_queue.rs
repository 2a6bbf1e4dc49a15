//! Ad queue persistence.
//!
//! The claim/release pair below is the scheduler's only cross-step critical
//! section: `claim_random_pending` both selects and marks a pending entry in
//! a single conditional UPDATE, so no entry can be handed to two dispatch
//! attempts.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::models::AdQueueEntry;
use crate::Result;

/// Atomically claim one pending entry of a task, chosen uniformly at random.
///
/// The claimed entry is marked sent (with `sent_at` stamped) in the same
/// statement that selects it. Returns the destination chat id, or `None`
/// when the task has no pending entries.
pub async fn claim_random_pending(pool: &SqlitePool, task_id: i64) -> Result<Option<i64>> {
    let chat_id = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE ad_queue
        SET sent = 1, sent_at = datetime('now'), error = NULL
        WHERE rowid = (
            SELECT rowid
            FROM ad_queue
            WHERE task_id = ? AND sent = 0
            ORDER BY RANDOM()
            LIMIT 1
        )
        RETURNING chat_id
        "#,
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?;

    Ok(chat_id)
}

/// Release a previously claimed entry back to pending.
///
/// Used when the claim turned out to be rate-limited (no error) or when the
/// dispatch failed (error recorded for later inspection). The entry becomes
/// eligible again on the next cycle.
pub async fn release_claim(
    pool: &SqlitePool,
    task_id: i64,
    chat_id: i64,
    error: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE ad_queue
        SET sent = 0, sent_at = NULL, error = ?
        WHERE task_id = ? AND chat_id = ? AND sent = 1
        "#,
    )
    .bind(error)
    .bind(task_id)
    .bind(chat_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Sends to a chat across all tasks inside the trailing window, excluding
/// the given task's own entry.
///
/// The exclusion lets the scheduler count "other sends" while it holds a
/// freshly stamped claim for that task.
pub async fn recent_sends_for_chat(
    pool: &SqlitePool,
    chat_id: i64,
    window: Duration,
    exclude_task: i64,
) -> Result<i64> {
    let modifier = format!("-{} seconds", window.as_secs());
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM ad_queue
        WHERE chat_id = ? AND sent = 1 AND task_id != ?
          AND sent_at >= datetime('now', ?)
        "#,
    )
    .bind(chat_id)
    .bind(exclude_task)
    .bind(modifier)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// All queue entries of a task, by chat id.
pub async fn entries_for_task(pool: &SqlitePool, task_id: i64) -> Result<Vec<AdQueueEntry>> {
    let rows = sqlx::query_as::<_, AdQueueEntry>(
        r#"
        SELECT task_id, chat_id, sent, sent_at, error
        FROM ad_queue
        WHERE task_id = ?
        ORDER BY chat_id
        "#,
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Number of not-yet-sent entries of a task.
pub async fn pending_count(pool: &SqlitePool, task_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM ad_queue
        WHERE task_id = ? AND sent = 0
        "#,
    )
    .bind(task_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
