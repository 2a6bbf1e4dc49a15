//! Rate-limited broadcast distribution for Warden.
//!
//! This crate provides the [`AdScheduler`], which queues broadcast tasks
//! against a snapshot of recently active chats and dispatches them from a
//! fixed-interval background cycle:
//!
//! - one pending destination per task per cycle, drawn uniformly at random
//! - a shared per-chat send cap over a trailing window, across all tasks
//! - atomic claim-and-mark of queue entries, so no entry is dispatched twice
//! - failed dispatches released for retry; completion notified exactly once
//!
//! All progress is persisted, so the cycle resumes cleanly after a restart.
//!
//! # Example
//!
//! ```no_run
//! use ad_scheduler::{AdScheduler, SchedulerConfig};
//! use chat_core::NoOpTransport;
//! use database::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("sqlite:warden.db?mode=rwc").await?;
//! db.migrate().await?;
//!
//! let scheduler = AdScheduler::new(db, NoOpTransport, SchedulerConfig::from_env());
//! let task_id = scheduler.enqueue_task(3, "Big announcement", None).await?;
//! println!("queued task {task_id}");
//!
//! // Run until the process is told to stop
//! let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
//! # drop(stop_tx);
//! scheduler
//!     .run(async {
//!         let _ = stop_rx.await;
//!     })
//!     .await;
//! # Ok(())
//! # }
//! ```

mod error;
mod scheduler;

pub use error::SchedulerError;
pub use scheduler::{AdScheduler, CycleReport, SchedulerConfig, TaskProgress};
