//! Chat transport trait and test implementations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::TransportError;
use crate::{ChatId, UserId};

/// Member permissions applied by a restriction.
///
/// A structured record rather than a platform-specific map, validated at the
/// boundary by whichever transport implementation translates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatPermissions {
    /// Whether the member may send text messages.
    pub can_send_messages: bool,
    /// Whether the member may send media (stickers, gifs, photos, voice).
    pub can_send_media: bool,
}

impl ChatPermissions {
    /// Permissions for a muted member: nothing may be sent.
    pub fn muted() -> Self {
        Self {
            can_send_messages: false,
            can_send_media: false,
        }
    }

    /// Unrestricted permissions.
    pub fn unrestricted() -> Self {
        Self {
            can_send_messages: true,
            can_send_media: true,
        }
    }
}

/// Trait for the chat platform transport.
///
/// Abstracted to support different platforms and tests. All calls are
/// fallible; callers catch errors at this boundary and downgrade them to an
/// outcome instead of propagating them.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a text message to a chat.
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError>;

    /// Send a photo to a chat, with an optional caption.
    ///
    /// `path` is a transport-resolvable reference to the image (local path or
    /// previously uploaded file id).
    async fn send_photo(
        &self,
        chat: ChatId,
        path: &str,
        caption: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Restrict a member's permissions in a chat until the given instant.
    async fn restrict_member(
        &self,
        chat: ChatId,
        user: UserId,
        permissions: ChatPermissions,
        until: DateTime<Utc>,
    ) -> Result<(), TransportError>;

    /// Permanently remove a member from a chat.
    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<(), TransportError>;
}

/// A no-op transport for testing that discards all calls.
#[derive(Debug, Clone, Default)]
pub struct NoOpTransport;

#[async_trait]
impl ChatTransport for NoOpTransport {
    async fn send_text(&self, _chat: ChatId, _text: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_photo(
        &self,
        _chat: ChatId,
        _path: &str,
        _caption: Option<&str>,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn restrict_member(
        &self,
        _chat: ChatId,
        _user: UserId,
        _permissions: ChatPermissions,
        _until: DateTime<Utc>,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn ban_member(&self, _chat: ChatId, _user: UserId) -> Result<(), TransportError> {
        Ok(())
    }
}

/// A single call captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `send_text(chat, text)`
    Text { chat: ChatId, text: String },
    /// `send_photo(chat, path, caption)`
    Photo {
        chat: ChatId,
        path: String,
        caption: Option<String>,
    },
    /// `restrict_member(chat, user, ..)`
    Restrict { chat: ChatId, user: UserId },
    /// `ban_member(chat, user)`
    Ban { chat: ChatId, user: UserId },
}

/// A transport for tests that records every call and can be told to fail.
///
/// Clones share the same call log and failure switches, so a test can hand a
/// clone to the component under test and assert on the original.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    calls: Arc<Mutex<Vec<TransportCall>>>,
    fail_sends: Arc<AtomicBool>,
    fail_restrictions: Arc<AtomicBool>,
}

impl RecordingTransport {
    /// Create a transport that succeeds on every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent send calls fail (or succeed again).
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent restriction calls fail (or succeed again).
    pub fn set_fail_restrictions(&self, fail: bool) {
        self.fail_restrictions.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all recorded calls, in order.
    pub async fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().await.clone()
    }

    /// Number of recorded calls.
    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Texts sent to the given chat, in order.
    pub async fn texts_to(&self, chat: ChatId) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                TransportCall::Text { chat: c, text } if *c == chat => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: TransportCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("recording: sends disabled".into()));
        }
        self.record(TransportCall::Text {
            chat,
            text: text.to_string(),
        })
        .await;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        path: &str,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("recording: sends disabled".into()));
        }
        self.record(TransportCall::Photo {
            chat,
            path: path.to_string(),
            caption: caption.map(str::to_string),
        })
        .await;
        Ok(())
    }

    async fn restrict_member(
        &self,
        chat: ChatId,
        user: UserId,
        _permissions: ChatPermissions,
        _until: DateTime<Utc>,
    ) -> Result<(), TransportError> {
        if self.fail_restrictions.load(Ordering::SeqCst) {
            return Err(TransportError::RestrictionFailed(
                "recording: restrictions disabled".into(),
            ));
        }
        self.record(TransportCall::Restrict { chat, user }).await;
        Ok(())
    }

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<(), TransportError> {
        if self.fail_restrictions.load(Ordering::SeqCst) {
            return Err(TransportError::RestrictionFailed(
                "recording: restrictions disabled".into(),
            ));
        }
        self.record(TransportCall::Ban { chat, user }).await;
        Ok(())
    }
}
