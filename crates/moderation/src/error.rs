//! Error types for enforcement operations.

use database::DatabaseError;
use thiserror::Error;

/// Errors that can occur during enforcement.
///
/// Transport failures are intentionally absent: the restriction boundary
/// downgrades them to an `enforced` flag on the verdict.
#[derive(Debug, Error)]
pub enum EnforcementError {
    /// The store was unreachable or a query failed; nothing was recorded.
    #[error("persistence error: {0}")]
    Database(#[from] DatabaseError),
}
