//! Error types for scheduler operations.

use database::DatabaseError;
use thiserror::Error;

/// Errors that can occur during ad scheduling.
///
/// Dispatch failures are not errors at this level: a failed send releases
/// the queue entry for retry on a later cycle and the cycle carries on.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Task total must be positive.
    #[error("invalid task total: {0}")]
    InvalidTotal(i64),

    /// No chat was active inside the targeting window.
    #[error("no eligible target chats")]
    NoEligibleChats,

    /// The target snapshot is too small for the requested total; the task
    /// could never complete.
    #[error("task total {total} exceeds {targets} eligible target chats")]
    InsufficientTargets { total: i64, targets: usize },

    /// The store was unreachable or a query failed.
    #[error("persistence error: {0}")]
    Database(#[from] DatabaseError),
}
