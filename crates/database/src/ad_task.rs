//! Ad task persistence.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::AdTask;

/// Create a task and its queue entries in one transaction.
///
/// The queue snapshot is taken exactly once here; the target set never
/// changes afterwards. Returns the new task id.
pub async fn create_task_with_queue(
    pool: &SqlitePool,
    total: i64,
    text: &str,
    image: Option<&str>,
    target_chats: &[i64],
) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO ad_tasks (total, text, image)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(total)
    .bind(text)
    .bind(image)
    .execute(&mut *tx)
    .await?;

    let task_id = result.last_insert_rowid();

    for chat_id in target_chats {
        sqlx::query(
            r#"
            INSERT INTO ad_queue (task_id, chat_id)
            VALUES (?, ?)
            "#,
        )
        .bind(task_id)
        .bind(chat_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(task_id)
}

/// Get a task by id.
pub async fn get_task(pool: &SqlitePool, id: i64) -> Result<AdTask> {
    sqlx::query_as::<_, AdTask>(
        r#"
        SELECT id, total, sent, status, text, image, created
        FROM ad_tasks
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "AdTask",
        id: id.to_string(),
    })
}

/// All tasks still in the active state, oldest first.
pub async fn active_tasks(pool: &SqlitePool) -> Result<Vec<AdTask>> {
    let tasks = sqlx::query_as::<_, AdTask>(
        r#"
        SELECT id, total, sent, status, text, image, created
        FROM ad_tasks
        WHERE status = 'active'
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(tasks)
}

/// Increment a task's sent counter, guarded by `sent < total`.
///
/// Returns the new (sent, total) pair, or `None` when the task is not active
/// or the counter is already full.
pub async fn increment_sent(pool: &SqlitePool, id: i64) -> Result<Option<(i64, i64)>> {
    let row = sqlx::query_as::<_, (i64, i64)>(
        r#"
        UPDATE ad_tasks
        SET sent = sent + 1
        WHERE id = ? AND status = 'active' AND sent < total
        RETURNING sent, total
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Transition a task from active to completed. Returns whether it applied.
pub async fn mark_completed(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE ad_tasks
        SET status = 'completed'
        WHERE id = ? AND status = 'active'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Transition a task from active to cancelled. Returns whether it applied.
pub async fn cancel_task(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE ad_tasks
        SET status = 'cancelled'
        WHERE id = ? AND status = 'active'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
