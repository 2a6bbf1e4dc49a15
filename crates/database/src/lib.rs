//! SQLite persistence layer for Warden.
//!
//! This crate provides async database operations for the message log,
//! moderation records, broadcast tasks, conversational context and per-chat
//! settings using SQLx with SQLite.
//!
//! All entities live in one schema behind a single [`Database`] handle that
//! is constructed once at startup and passed by reference to every consumer;
//! there is no ambient global instance.
//!
//! # Example
//!
//! ```no_run
//! use database::{chat_history, models::MessageType, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:warden.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     // Log an observed message
//!     chat_history::append_message(db.pool(), -100123, 42, "hello", MessageType::Text).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod ad_queue;
pub mod ad_task;
pub mod chat_history;
pub mod context_memory;
pub mod error;
pub mod models;
pub mod moderation;
pub mod roast_cache;
pub mod settings;
pub mod user;

pub use error::{DatabaseError, Result};
pub use models::{
    ActivityRow, AdQueueEntry, AdTask, ChatMessage, ChatSettings, ContextEntry, ContextRole,
    MessageType, ModerationKind, ModerationRecord, RoastCacheEntry, TaskStatus, User,
};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    ///
    /// Sized for concurrent message handling plus the scheduler cycle.
    const DEFAULT_POOL_SIZE: u32 = 10;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist, or
    /// `sqlite::memory:` for tests.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!("Connected to database: {} (pool size: {})", url, pool_size);

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up
    /// to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
