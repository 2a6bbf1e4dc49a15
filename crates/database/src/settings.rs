//! Per-chat settings persistence.

use sqlx::SqlitePool;

use crate::models::ChatSettings;
use crate::Result;

/// Settings for a chat, defaulted when no row exists yet.
pub async fn get_settings(pool: &SqlitePool, chat_id: i64) -> Result<ChatSettings> {
    let record = sqlx::query_as::<_, ChatSettings>(
        r#"
        SELECT chat_id, anti_profanity, anti_flood
        FROM settings
        WHERE chat_id = ?
        "#,
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await?;

    Ok(record.unwrap_or_else(|| ChatSettings::default_for(chat_id)))
}

/// Create or update a chat's settings.
pub async fn upsert_settings(pool: &SqlitePool, settings: &ChatSettings) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (chat_id, anti_profanity, anti_flood)
        VALUES (?, ?, ?)
        ON CONFLICT(chat_id) DO UPDATE SET
            anti_profanity = excluded.anti_profanity,
            anti_flood = excluded.anti_flood
        "#,
    )
    .bind(settings.chat_id)
    .bind(settings.anti_profanity)
    .bind(settings.anti_flood)
    .execute(pool)
    .await?;

    Ok(())
}
