//! Error types for collaborator calls.

use thiserror::Error;

/// Errors that can occur when talking to the chat platform.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A send call (text or photo) was rejected or timed out.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A restriction call (mute or ban) was rejected.
    #[error("restriction failed: {0}")]
    RestrictionFailed(String),

    /// The transport is not connected or otherwise unavailable.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur when requesting an AI completion.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The completion request failed.
    #[error("completion request failed: {0}")]
    RequestFailed(String),

    /// The backend returned an empty response.
    #[error("completion returned an empty response")]
    EmptyResponse,
}
