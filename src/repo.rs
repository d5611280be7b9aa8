//! Collaborator boundaries: persistence and identity.
//!
//! The engine only ever talks to storage through `DealRepository`, so the
//! backing service (local SQLite, a remote API) is swappable and tests can
//! inject failures.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Deal, DealPatch, Prospect};

/// Errors from the persistence layer. The engine treats every variant the
/// same way (surface, and for stage changes reload), but the distinction
/// matters for logging and for the SQLite implementation.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),
}

/// Asynchronous persistence service for deals and their prospects.
///
/// `fetch_deals` returns deals with prospects embedded, most-recent-created
/// first. Writes are all-or-nothing per call; any failure leaves the backing
/// store unchanged.
#[async_trait]
pub trait DealRepository: Send + Sync {
    async fn fetch_deals(&self, user_id: &str) -> Result<Vec<Deal>, RepoError>;
    async fn insert_deal(&self, deal: &Deal) -> Result<(), RepoError>;
    async fn update_deal(&self, id: &str, patch: &DealPatch) -> Result<(), RepoError>;
    async fn delete_deal(&self, id: &str) -> Result<(), RepoError>;
    async fn insert_prospect(&self, prospect: &Prospect) -> Result<(), RepoError>;
    async fn delete_prospect(&self, id: &str) -> Result<(), RepoError>;
}

/// Supplies the current user id that scopes create and fetch operations.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<String>;
}

/// Fixed identity for single-user sessions and tests.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub String);

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Identity provider with no authenticated user.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn current_user(&self) -> Option<String> {
        None
    }
}
