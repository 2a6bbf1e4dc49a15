//! TTL memoization of generated roasts.

use std::env;
use std::time::Duration;

use database::{roast_cache, Database};
use tracing::debug;

/// Default freshness window for cached roasts.
const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Memoizes one roast per (target, chat) pair for a freshness window.
///
/// Saves a completion round-trip when the same subject is roasted again in
/// the same chat shortly after. A `put` always overwrites and restarts the
/// window; a `get` outside the window is a miss.
#[derive(Debug, Clone)]
pub struct RoastCache {
    db: Database,
    ttl: Duration,
}

impl RoastCache {
    /// Create a cache with the default one-hour freshness window.
    pub fn new(db: Database) -> Self {
        Self::with_ttl(db, DEFAULT_TTL)
    }

    /// Create a cache with a custom freshness window.
    pub fn with_ttl(db: Database, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    /// Create a cache with the window taken from the environment.
    pub fn from_env(db: Database) -> Self {
        let ttl = env::var("WARDEN_ROAST_TTL_SECS")
            .ok()
            .and_then(|value| value.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TTL);
        Self::with_ttl(db, ttl)
    }

    /// The cache's freshness window.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached roast for (target, chat), if still fresh.
    pub async fn get(&self, target_id: i64, chat_id: i64) -> database::Result<Option<String>> {
        let entry = roast_cache::fresh_roast(self.db.pool(), target_id, chat_id, self.ttl).await?;
        if entry.is_some() {
            debug!(target_id, chat_id, "roast cache hit");
        }
        Ok(entry.map(|record| record.roast_text))
    }

    /// Store a roast for (target, chat), replacing any previous value.
    pub async fn put(&self, target_id: i64, chat_id: i64, roast: &str) -> database::Result<()> {
        roast_cache::upsert_roast(self.db.pool(), target_id, chat_id, roast).await
    }

    /// Drop every entry older than the freshness window. Returns the number
    /// removed.
    pub async fn prune_expired(&self) -> database::Result<u64> {
        roast_cache::prune_older_than(self.db.pool(), self.ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_cache() -> (RoastCache, Database) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        (RoastCache::new(db.clone()), db)
    }

    #[tokio::test]
    async fn test_hit_within_window() {
        let (cache, _db) = test_cache().await;

        assert_eq!(cache.get(10, 1).await.unwrap(), None);

        cache.put(10, 1, "nice haircut").await.unwrap();
        assert_eq!(cache.get(10, 1).await.unwrap().as_deref(), Some("nice haircut"));

        // Keys are per (target, chat)
        assert_eq!(cache.get(10, 2).await.unwrap(), None);
        assert_eq!(cache.get(11, 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (cache, _db) = test_cache().await;

        cache.put(10, 1, "first").await.unwrap();
        cache.put(10, 1, "second").await.unwrap();

        assert_eq!(cache.get(10, 1).await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_miss_after_window() {
        let (cache, db) = test_cache().await;

        cache.put(10, 1, "stale soon").await.unwrap();
        sqlx::query("UPDATE roast_cache SET created = datetime('now', '-2 hours')")
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(cache.get(10, 1).await.unwrap(), None);

        // A fresh put revives the key
        cache.put(10, 1, "fresh again").await.unwrap();
        assert_eq!(cache.get(10, 1).await.unwrap().as_deref(), Some("fresh again"));
    }

    #[tokio::test]
    async fn test_prune_expired() {
        let (cache, db) = test_cache().await;

        cache.put(10, 1, "old").await.unwrap();
        cache.put(11, 1, "new").await.unwrap();
        sqlx::query("UPDATE roast_cache SET created = datetime('now', '-2 hours') WHERE target_id = 10")
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(cache.prune_expired().await.unwrap(), 1);
        assert_eq!(cache.get(11, 1).await.unwrap().as_deref(), Some("new"));
    }
}
