//! Bounded conversational memory for Warden.
//!
//! This crate provides the per-chat [`ContextWindow`] that feeds prompt
//! assembly, and the [`RoastCache`] that memoizes expensive AI-generated
//! roasts per (target, chat) pair.
//!
//! The window is bounded by a hysteresis trim: inserts are cheap until the
//! high-water mark, then one batched eviction cuts the chat back to the
//! low-water mark. Ordering is by strictly increasing id, so "oldest" never
//! depends on timestamp precision.
//!
//! # Example
//!
//! ```no_run
//! use context_memory::{ContextWindow, WindowPolicy};
//! use database::{models::ContextRole, Database};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("sqlite:warden.db?mode=rwc").await?;
//! db.migrate().await?;
//!
//! let window = ContextWindow::new(db, WindowPolicy::default());
//! window.append(-100123, ContextRole::User, "roast me").await?;
//! let prompt = window.prompt(-100123, 20).await?;
//! # let _ = prompt;
//! # Ok(())
//! # }
//! ```

mod roast;
mod window;

pub use roast::RoastCache;
pub use window::{ContextWindow, WindowPolicy};
