//! Enforcement engine for Warden.
//!
//! This crate evaluates inbound message events against the append-only
//! moderation log and issues restriction commands through the chat
//! transport. It provides:
//!
//! - [`EnforcementEngine`] - per-message checks and the administrative warn path
//! - [`ModerationState`] / [`state_of`] - the single projection of a user's
//!   current state from the log
//! - [`Verdict`] - the outcome of evaluating one message
//!
//! The log is authoritative: records are persisted before the external
//! restriction call, and a failed call is downgraded to `enforced: false` on
//! the verdict rather than propagated.
//!
//! # Example
//!
//! ```no_run
//! use chat_core::NoOpTransport;
//! use database::{Database, models::MessageType};
//! use moderation::{EnforcementEngine, EngineConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("sqlite:warden.db?mode=rwc").await?;
//! db.migrate().await?;
//!
//! let engine = EnforcementEngine::new(db, NoOpTransport, EngineConfig::default());
//! let verdict = engine
//!     .evaluate_and_act(-100123, 42, "hello", MessageType::Text)
//!     .await?;
//! println!("{verdict:?}");
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod state;

pub use engine::{EnforcementEngine, EngineConfig, MuteReason, Verdict, WarnOutcome};
pub use error::EnforcementError;
pub use state::{state_of, EscalationLevel, ModerationState};
