//! AI completion client trait and prompt types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CompletionError;

/// A single message in a completion prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Role: "user", "assistant" or "system"
    pub role: String,
    /// Message content
    pub content: String,
}

impl PromptMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Trait for the AI completion backend.
///
/// Consumed by the callers that assemble prompts from the context window and
/// roast cache; the core never calls it directly.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a completion for an ordered conversation history.
    async fn complete(
        &self,
        history: &[PromptMessage],
        temperature: f32,
    ) -> Result<String, CompletionError>;
}

/// A completion client for tests that always returns a fixed reply.
#[derive(Debug, Clone)]
pub struct CannedCompletion {
    reply: String,
}

impl CannedCompletion {
    /// Create a client that replies with the given text.
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl CompletionClient for CannedCompletion {
    async fn complete(
        &self,
        _history: &[PromptMessage],
        _temperature: f32,
    ) -> Result<String, CompletionError> {
        Ok(self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_message_constructors() {
        assert_eq!(PromptMessage::user("hi").role, "user");
        assert_eq!(PromptMessage::assistant("hey").role, "assistant");
        assert_eq!(PromptMessage::system("rules").role, "system");
    }

    #[tokio::test]
    async fn test_canned_completion() {
        let client = CannedCompletion::new("always this");
        let reply = client
            .complete(&[PromptMessage::user("anything")], 0.7)
            .await
            .unwrap();
        assert_eq!(reply, "always this");
    }
}
