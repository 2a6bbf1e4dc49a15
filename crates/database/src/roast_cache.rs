//! Roast memoization persistence.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::models::RoastCacheEntry;
use crate::Result;

/// Store a roast for (target, chat), overwriting any existing value and
/// restarting its freshness window.
pub async fn upsert_roast(
    pool: &SqlitePool,
    target_id: i64,
    chat_id: i64,
    roast_text: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO roast_cache (target_id, chat_id, roast_text)
        VALUES (?, ?, ?)
        ON CONFLICT(target_id, chat_id) DO UPDATE SET
            roast_text = excluded.roast_text,
            created = datetime('now')
        "#,
    )
    .bind(target_id)
    .bind(chat_id)
    .bind(roast_text)
    .execute(pool)
    .await?;

    Ok(())
}

/// The cached roast for (target, chat), only if created within the window.
pub async fn fresh_roast(
    pool: &SqlitePool,
    target_id: i64,
    chat_id: i64,
    window: Duration,
) -> Result<Option<RoastCacheEntry>> {
    let modifier = format!("-{} seconds", window.as_secs());
    let record = sqlx::query_as::<_, RoastCacheEntry>(
        r#"
        SELECT target_id, chat_id, roast_text, created
        FROM roast_cache
        WHERE target_id = ? AND chat_id = ?
          AND created >= datetime('now', ?)
        "#,
    )
    .bind(target_id)
    .bind(chat_id)
    .bind(modifier)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Prune cache entries older than the specified TTL.
pub async fn prune_older_than(pool: &SqlitePool, ttl: Duration) -> Result<u64> {
    let modifier = format!("-{} seconds", ttl.as_secs());
    let result = sqlx::query(
        r#"
        DELETE FROM roast_cache
        WHERE created < datetime('now', ?)
        "#,
    )
    .bind(modifier)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
