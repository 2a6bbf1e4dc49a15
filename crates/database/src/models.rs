//! Database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A chat platform user, created on first observed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Stable platform id.
    pub id: i64,
    /// Handle, if the platform exposes one.
    pub username: Option<String>,
    /// Display name.
    pub first_name: String,
    /// Creation timestamp.
    pub created_at: String,
}

/// The type of a logged chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Sticker,
    Gif,
    Photo,
    Voice,
    Other,
}

impl MessageType {
    /// Whether this type counts toward the media flood heuristic.
    pub fn is_flood_media(self) -> bool {
        matches!(self, MessageType::Sticker | MessageType::Gif)
    }
}

/// One entry of the append-only message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    /// Auto-incrementing id.
    pub id: i64,
    /// Chat the message was seen in.
    pub chat_id: i64,
    /// Author.
    pub user_id: i64,
    /// Message text (empty for pure media messages).
    pub text: String,
    /// Message type.
    pub message_type: MessageType,
    /// Arrival timestamp.
    pub timestamp: String,
}

/// Per (user, chat, date) message count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ActivityRow {
    pub user_id: i64,
    pub chat_id: i64,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// Messages counted on that date.
    pub messages: i64,
}

/// The kind of a moderation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ModerationKind {
    Mute,
    Warn,
    Ban,
    Ignore,
}

/// One entry of the append-only moderation log.
///
/// Current moderation state is always derived by projecting over these
/// records; no record is ever updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ModerationRecord {
    /// Auto-incrementing id.
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub kind: ModerationKind,
    /// Expiry for time-bounded records (mutes); `None` means no expiry.
    pub expires: Option<String>,
    pub reason: String,
    /// Issuing admin, if issued administratively.
    pub admin_id: Option<i64>,
    pub created: String,
}

/// Lifecycle status of an ad task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Completed,
    Cancelled,
}

/// A unit of broadcast work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AdTask {
    pub id: i64,
    /// Target send count; always > 0.
    pub total: i64,
    /// Successful sends so far; never exceeds `total`.
    pub sent: i64,
    pub status: TaskStatus,
    /// Broadcast text (caption when an image is attached).
    pub text: String,
    /// Optional image reference.
    pub image: Option<String>,
    pub created: String,
}

/// One (task, chat) pair of a task's immutable target snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AdQueueEntry {
    pub task_id: i64,
    pub chat_id: i64,
    /// Set once the entry has been dispatched (or claimed for dispatch).
    pub sent: bool,
    pub sent_at: Option<String>,
    /// Last dispatch error, if the most recent attempt failed.
    pub error: Option<String>,
}

/// Role of a context memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContextRole {
    User,
    Assistant,
    System,
}

impl ContextRole {
    /// The role string used in completion prompts.
    pub fn as_str(self) -> &'static str {
        match self {
            ContextRole::User => "user",
            ContextRole::Assistant => "assistant",
            ContextRole::System => "system",
        }
    }
}

/// One message of a chat's bounded conversational context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ContextEntry {
    /// Strictly increasing id; defines "oldest".
    pub id: i64,
    pub chat_id: i64,
    pub role: ContextRole,
    pub content: String,
    pub timestamp: String,
}

/// A memoized roast for a (target, chat) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RoastCacheEntry {
    pub target_id: i64,
    pub chat_id: i64,
    pub roast_text: String,
    pub created: String,
}

/// Per-chat feature toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatSettings {
    pub chat_id: i64,
    pub anti_profanity: bool,
    pub anti_flood: bool,
}

impl ChatSettings {
    /// Defaults applied when a chat has no settings row yet.
    pub fn default_for(chat_id: i64) -> Self {
        Self {
            chat_id,
            anti_profanity: false,
            anti_flood: true,
        }
    }
}
