//! The bounded per-chat context window.

use std::env;

use chat_core::PromptMessage;
use database::models::{ContextEntry, ContextRole};
use database::{context_memory, Database};
use tracing::debug;

/// Eviction bounds for a chat's context.
///
/// Inserting past `high_water` trims the chat down to `low_water` in one
/// batch, so eviction cost is paid once per five inserts rather than on
/// every append.
#[derive(Debug, Clone)]
pub struct WindowPolicy {
    /// Entry count that triggers a trim.
    pub high_water: i64,
    /// Entry count a trim cuts back to.
    pub low_water: i64,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            high_water: 20,
            low_water: 15,
        }
    }
}

impl WindowPolicy {
    /// Load window bounds from environment variables.
    pub fn from_env() -> Self {
        let mut policy = Self::default();

        if let Some(value) = env_i64("WARDEN_CONTEXT_HIGH_WATER") {
            policy.high_water = value;
        }
        if let Some(value) = env_i64("WARDEN_CONTEXT_LOW_WATER") {
            policy.low_water = value;
        }

        policy
    }
}

/// Bounded per-chat conversation memory backed by the shared store.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    db: Database,
    policy: WindowPolicy,
}

impl ContextWindow {
    /// Create a window over the shared database handle.
    pub fn new(db: Database, policy: WindowPolicy) -> Self {
        Self { db, policy }
    }

    /// Get the window's eviction policy.
    pub fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    /// Record a context message for a chat.
    ///
    /// An identical (chat, role, content) triple is not re-inserted; repeats
    /// return `false` and leave the window untouched. Crossing the
    /// high-water mark evicts the chat's oldest entries down to the
    /// low-water mark.
    pub async fn append(
        &self,
        chat_id: i64,
        role: ContextRole,
        content: &str,
    ) -> database::Result<bool> {
        let inserted = context_memory::insert_entry(self.db.pool(), chat_id, role, content).await?;
        if !inserted {
            return Ok(false);
        }

        let count = context_memory::count_for_chat(self.db.pool(), chat_id).await?;
        if count >= self.policy.high_water {
            let evicted =
                context_memory::trim_to(self.db.pool(), chat_id, self.policy.low_water).await?;
            debug!(chat_id, evicted, "context window trimmed");
        }

        Ok(true)
    }

    /// The `limit` most recent entries for a chat, oldest to newest.
    pub async fn read(&self, chat_id: i64, limit: i64) -> database::Result<Vec<ContextEntry>> {
        context_memory::recent(self.db.pool(), chat_id, limit).await
    }

    /// The `limit` most recent entries as a ready-to-send prompt.
    pub async fn prompt(&self, chat_id: i64, limit: i64) -> database::Result<Vec<PromptMessage>> {
        let entries = self.read(chat_id, limit).await?;
        Ok(entries
            .into_iter()
            .map(|entry| PromptMessage {
                role: entry.role.as_str().to_string(),
                content: entry.content,
            })
            .collect())
    }

    /// Forget a chat's context entirely. Returns the number of entries removed.
    pub async fn clear(&self, chat_id: i64) -> database::Result<u64> {
        context_memory::clear_chat(self.db.pool(), chat_id).await
    }
}

fn env_i64(key: &str) -> Option<i64> {
    env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT: i64 = -100500;

    async fn test_window() -> ContextWindow {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        ContextWindow::new(db, WindowPolicy::default())
    }

    #[tokio::test]
    async fn test_append_and_read_order() {
        let window = test_window().await;

        window.append(CHAT, ContextRole::User, "first").await.unwrap();
        window.append(CHAT, ContextRole::Assistant, "second").await.unwrap();
        window.append(CHAT, ContextRole::User, "third").await.unwrap();

        let entries = window.read(CHAT, 10).await.unwrap();
        let contents: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);

        // Limit keeps the most recent, still oldest first
        let entries = window.read(CHAT, 2).await.unwrap();
        let contents: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["second", "third"]);
    }

    #[tokio::test]
    async fn test_duplicate_triples_are_dropped() {
        let window = test_window().await;

        assert!(window.append(CHAT, ContextRole::User, "hi").await.unwrap());
        assert!(!window.append(CHAT, ContextRole::User, "hi").await.unwrap());
        assert!(window.append(CHAT, ContextRole::Assistant, "hi").await.unwrap());

        assert_eq!(window.read(CHAT, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_hysteresis_trim() {
        let window = test_window().await;

        // 19 inserts stay below the mark
        for i in 0..19 {
            window
                .append(CHAT, ContextRole::User, &format!("msg {i}"))
                .await
                .unwrap();
        }
        assert_eq!(window.read(CHAT, 50).await.unwrap().len(), 19);

        // The 20th crosses it and trims to 15
        window.append(CHAT, ContextRole::User, "msg 19").await.unwrap();
        let entries = window.read(CHAT, 50).await.unwrap();
        assert_eq!(entries.len(), 15);

        // The trimmed set is the newest 15, oldest first
        assert_eq!(entries.first().unwrap().content, "msg 5");
        assert_eq!(entries.last().unwrap().content, "msg 19");
        assert!(entries.windows(2).all(|w| w[0].id < w[1].id));

        // Growth restarts from the low-water mark
        window.append(CHAT, ContextRole::User, "after trim").await.unwrap();
        assert_eq!(window.read(CHAT, 50).await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_chats_are_isolated() {
        let window = test_window().await;

        for i in 0..25 {
            window
                .append(CHAT, ContextRole::User, &format!("msg {i}"))
                .await
                .unwrap();
        }
        window.append(CHAT + 1, ContextRole::User, "other").await.unwrap();

        // The busy chat trimmed; the quiet one kept its single entry
        assert!(window.read(CHAT, 50).await.unwrap().len() <= 20);
        assert_eq!(window.read(CHAT + 1, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prompt_maps_roles() {
        let window = test_window().await;

        window.append(CHAT, ContextRole::System, "be nice").await.unwrap();
        window.append(CHAT, ContextRole::User, "hello").await.unwrap();
        window.append(CHAT, ContextRole::Assistant, "hi there").await.unwrap();

        let prompt = window.prompt(CHAT, 10).await.unwrap();
        let roles: Vec<&str> = prompt.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
        assert_eq!(prompt[1].content, "hello");
    }

    #[tokio::test]
    async fn test_clear() {
        let window = test_window().await;

        window.append(CHAT, ContextRole::User, "a").await.unwrap();
        window.append(CHAT, ContextRole::User, "b").await.unwrap();

        assert_eq!(window.clear(CHAT).await.unwrap(), 2);
        assert!(window.read(CHAT, 10).await.unwrap().is_empty());
    }
}
