//! Error types for board operations.
//!
//! Errors are classified by recoverability:
//! - Validation / precondition failures: caught before any store mutation
//! - Persistence failures: the write was rejected; local handling depends on
//!   the operation (CRUD leaves local state untouched, stage changes reload)
//! - Fetch failures: full-board load failed, retryable as a whole

use thiserror::Error;

use crate::repo::RepoError;

/// Error type for all operations exposed by the board engine.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Field validation failed; nothing was mutated or written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Target stage id does not exist in the stage registry.
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Deal not found: {0}")]
    DealNotFound(String),

    #[error("Prospect not found: {0}")]
    ProspectNotFound(String),

    /// No authenticated user; create operations require one.
    #[error("No authenticated user")]
    NotAuthenticated,

    /// A persistence write failed. For stage changes the engine has already
    /// discarded the optimistic mutation via a full reload.
    #[error("Persistence error: {0}")]
    Persistence(#[from] RepoError),

    /// Loading the deal collection failed; the board keeps its previous
    /// contents and the load can be retried.
    #[error("Failed to load deals: {0}")]
    Fetch(RepoError),
}

impl BoardError {
    /// Returns true if re-triggering the same operation can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BoardError::Persistence(_) | BoardError::Fetch(_))
    }
}

/// Serializable error representation for UI surfaces.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardErrorInfo {
    pub message: String,
    pub can_retry: bool,
}

impl From<&BoardError> for BoardErrorInfo {
    fn from(err: &BoardError) -> Self {
        BoardErrorInfo {
            message: err.to_string(),
            can_retry: err.is_retryable(),
        }
    }
}
