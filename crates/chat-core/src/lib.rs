//! Core traits and types for chat platform collaborators.
//!
//! This crate provides the shared interface between the Warden core and the
//! external services it drives. It defines:
//!
//! - [`ChatTransport`] - The trait for the chat platform (sends, restrictions)
//! - [`CompletionClient`] - The trait for the AI completion backend
//! - [`ChatPermissions`] - Structured member permissions for restrictions
//! - [`PromptMessage`] - A single role/content entry of a completion prompt
//!
//! Every transport call is fallible and consumers are expected to catch
//! failures at the boundary and downgrade them to an outcome, never to let
//! them abort a processing loop.
//!
//! # Example
//!
//! ```rust
//! use chat_core::{ChatPermissions, ChatTransport, TransportError};
//! use async_trait::async_trait;
//! use chrono::{DateTime, Utc};
//!
//! struct MyTransport;
//!
//! #[async_trait]
//! impl ChatTransport for MyTransport {
//!     async fn send_text(&self, _chat: i64, _text: &str) -> Result<(), TransportError> {
//!         Ok(())
//!     }
//!
//!     async fn send_photo(
//!         &self,
//!         _chat: i64,
//!         _path: &str,
//!         _caption: Option<&str>,
//!     ) -> Result<(), TransportError> {
//!         Ok(())
//!     }
//!
//!     async fn restrict_member(
//!         &self,
//!         _chat: i64,
//!         _user: i64,
//!         _permissions: ChatPermissions,
//!         _until: DateTime<Utc>,
//!     ) -> Result<(), TransportError> {
//!         Ok(())
//!     }
//!
//!     async fn ban_member(&self, _chat: i64, _user: i64) -> Result<(), TransportError> {
//!         Ok(())
//!     }
//! }
//! ```

mod completion;
mod error;
mod transport;

pub use completion::{CannedCompletion, CompletionClient, PromptMessage};
pub use error::{CompletionError, TransportError};
pub use transport::{
    ChatPermissions, ChatTransport, NoOpTransport, RecordingTransport, TransportCall,
};

/// A chat (group or private conversation) identifier.
pub type ChatId = i64;

/// A user identifier.
pub type UserId = i64;

// Re-export async_trait for convenience
pub use async_trait::async_trait;
