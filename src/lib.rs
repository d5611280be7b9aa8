//! Board state and transition engine for a single-user sales pipeline.
//!
//! Deals move through a fixed, ordered sequence of stages on a kanban board.
//! The [`store::DealStore`] is the single source of truth; the
//! [`engine::BoardEngine`] is the only mutation surface over it, applying
//! stage changes optimistically with reload-on-failure rollback; the
//! [`drag::DragCoordinator`] reconciles pointer gestures into at most one
//! stage change; and [`aggregate`] / [`search`] are pure read-side
//! projections recomputed on every change.
//!
//! Persistence and identity are collaborators behind the traits in [`repo`];
//! [`db::SqliteRepository`] is the bundled local implementation.

pub mod aggregate;
pub mod clock;
pub mod db;
pub mod drag;
pub mod engine;
pub mod error;
pub mod repo;
pub mod search;
pub mod stages;
pub mod store;
pub mod types;

pub use aggregate::{BoardMetrics, FunnelSlice, StageColumn, TypeDistribution};
pub use clock::{Clock, SystemClock};
pub use engine::BoardEngine;
pub use error::{BoardError, BoardErrorInfo};
pub use repo::{DealRepository, IdentityProvider, RepoError};
pub use stages::{Stage, StageRegistry};
pub use store::DealStore;
pub use types::{Deal, DealDraft, DealPatch, DealType, Prospect};
