//! Board engine: the single mutation surface over the deal store.
//!
//! CRUD operations confirm the persistence write before touching local state.
//! Stage changes are the one optimistic path: the local mutation is applied
//! synchronously so the board reflects a drop with zero latency, then the
//! write is issued; on failure the engine discards the optimistic mutation by
//! reloading the whole collection rather than reverting the single field.
//! A targeted revert could diverge from server truth; a reload cannot, and
//! nothing else is locally buffered so nothing else is lost.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::aggregate::{board_metrics, BoardMetrics};
use crate::clock::Clock;
use crate::error::BoardError;
use crate::repo::{DealRepository, IdentityProvider};
use crate::stages::StageRegistry;
use crate::store::DealStore;
use crate::types::{
    validate_amount, validate_organization, Deal, DealDraft, DealPatch, Prospect,
};

pub struct BoardEngine {
    repo: Arc<dyn DealRepository>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    registry: StageRegistry,
    store: Mutex<DealStore>,
    /// Per-deal write locks: racing stage changes for the same deal queue up
    /// so the optimistic-mutate-then-write sequence never interleaves.
    deal_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl BoardEngine {
    pub fn new(
        repo: Arc<dyn DealRepository>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_registry(repo, identity, clock, StageRegistry::standard())
    }

    pub fn with_registry(
        repo: Arc<dyn DealRepository>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        registry: StageRegistry,
    ) -> Self {
        Self {
            repo,
            identity,
            clock,
            registry,
            store: Mutex::new(DealStore::new()),
            deal_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Fetch the deal collection for the current user and swap it in.
    /// Used for the initial load, explicit refresh, and rollback.
    pub async fn load(&self) -> Result<(), BoardError> {
        let user = self.current_user()?;
        let deals = self
            .repo
            .fetch_deals(&user)
            .await
            .map_err(BoardError::Fetch)?;
        let count = deals.len();
        self.store.lock().replace_all(deals);
        log::info!("loaded {count} deals for {user}");
        Ok(())
    }

    /// Alias for [`load`](Self::load); reads as intent at rollback call sites.
    pub async fn reload(&self) -> Result<(), BoardError> {
        self.load().await
    }

    /// Snapshot of all deals, most-recent-created first.
    pub fn list_deals(&self) -> Vec<Deal> {
        self.store.lock().list().to_vec()
    }

    pub fn deal(&self, id: &str) -> Option<Deal> {
        self.store.lock().get(id).cloned()
    }

    /// Headline figures at this instant, from the engine's own clock.
    pub fn metrics(&self) -> BoardMetrics {
        let store = self.store.lock();
        board_metrics(
            &self.registry,
            store.list(),
            self.clock.now(),
            self.clock.today(),
        )
    }

    /// Create a deal in the chosen (default: initial) stage. The write is
    /// confirmed before local state changes; a rejected create leaves the
    /// board exactly as it was.
    pub async fn create_deal(&self, draft: DealDraft) -> Result<Deal, BoardError> {
        let owner = self.current_user()?;
        let organization = validate_organization(&draft.organization)?;
        validate_amount(draft.amount)?;
        let stage_id = match draft.stage_id {
            Some(stage_id) if self.registry.contains(&stage_id) => stage_id,
            Some(stage_id) => return Err(BoardError::UnknownStage(stage_id)),
            None => self.registry.initial().id.clone(),
        };

        let now = self.clock.now();
        let deal = Deal {
            id: Uuid::new_v4().to_string(),
            owner,
            stage_id,
            organization,
            deal_type: draft.deal_type,
            amount: draft.amount,
            next_action_at: draft.next_action_at,
            notes: none_if_blank(draft.notes),
            company_url: none_if_blank(draft.company_url),
            contact_url: none_if_blank(draft.contact_url),
            last_activity_at: now,
            created_at: now,
            prospects: Vec::new(),
        };

        self.repo.insert_deal(&deal).await?;
        self.store.lock().upsert_local(deal.clone());
        Ok(deal)
    }

    /// Edit deal fields. Validation happens before the write, the write
    /// before the local apply; a failed write leaves local state untouched.
    pub async fn update_deal(&self, id: &str, mut patch: DealPatch) -> Result<Deal, BoardError> {
        if self.store.lock().get(id).is_none() {
            return Err(BoardError::DealNotFound(id.to_string()));
        }
        if let Some(org) = &patch.organization {
            patch.organization = Some(validate_organization(org)?);
        }
        if let Some(amount) = patch.amount {
            validate_amount(amount)?;
        }
        if let Some(stage_id) = &patch.stage_id {
            if !self.registry.contains(stage_id) {
                return Err(BoardError::UnknownStage(stage_id.clone()));
            }
        }
        patch.last_activity_at = Some(self.clock.now());

        self.repo.update_deal(id, &patch).await?;

        let mut store = self.store.lock();
        let deal = store
            .get_mut(id)
            .ok_or_else(|| BoardError::DealNotFound(id.to_string()))?;
        patch.apply(deal);
        Ok(deal.clone())
    }

    /// Delete a deal. The persistence layer cascades to its prospects.
    pub async fn delete_deal(&self, id: &str) -> Result<(), BoardError> {
        if self.store.lock().get(id).is_none() {
            return Err(BoardError::DealNotFound(id.to_string()));
        }
        self.repo.delete_deal(id).await?;
        self.store.lock().remove_local(id);
        Ok(())
    }

    /// Move a deal to another stage, optimistically.
    ///
    /// Same-stage changes are a guaranteed no-op: no mutation, no write, no
    /// `last_activity_at` bump. Unknown stage ids are rejected before any
    /// mutation. On write failure the whole collection is reloaded and the
    /// error surfaced; no automatic retry.
    pub async fn change_stage(&self, id: &str, new_stage_id: &str) -> Result<(), BoardError> {
        if !self.registry.contains(new_stage_id) {
            return Err(BoardError::UnknownStage(new_stage_id.to_string()));
        }

        let lock = self.deal_lock(id);
        let _guard = lock.lock().await;

        let current = self
            .store
            .lock()
            .get(id)
            .map(|d| d.stage_id.clone())
            .ok_or_else(|| BoardError::DealNotFound(id.to_string()))?;
        if current == new_stage_id {
            return Ok(());
        }

        // Optimistic phase: the board reflects the move immediately.
        let now = self.clock.now();
        {
            let mut store = self.store.lock();
            if let Some(deal) = store.get_mut(id) {
                deal.stage_id = new_stage_id.to_string();
                deal.last_activity_at = now;
            }
        }

        // Commit phase: persist exactly the two mutated fields.
        let patch = DealPatch::stage_change(new_stage_id, now);
        if let Err(err) = self.repo.update_deal(id, &patch).await {
            log::warn!("stage change write failed for deal {id}: {err}; reloading board");
            if let Err(reload_err) = self.load().await {
                log::error!("rollback reload failed: {reload_err}");
            }
            return Err(BoardError::Persistence(err));
        }
        Ok(())
    }

    /// Attach a prospect to a deal and re-stamp its activity.
    pub async fn add_prospect(
        &self,
        deal_id: &str,
        name: &str,
        notes: Option<String>,
    ) -> Result<Prospect, BoardError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BoardError::Validation(
                "Prospect name cannot be empty".to_string(),
            ));
        }
        let deal_type = self
            .store
            .lock()
            .get(deal_id)
            .map(|d| d.deal_type)
            .ok_or_else(|| BoardError::DealNotFound(deal_id.to_string()))?;
        if deal_type != crate::types::DealType::Partner {
            // Advisory only; the data model allows it.
            log::debug!("attaching prospect to non-partner deal {deal_id}");
        }

        let prospect = Prospect {
            id: Uuid::new_v4().to_string(),
            deal_id: deal_id.to_string(),
            name: name.to_string(),
            notes: none_if_blank(notes),
        };
        self.repo.insert_prospect(&prospect).await?;

        let now = self.clock.now();
        {
            let mut store = self.store.lock();
            store.attach_prospect_local(prospect.clone());
            if let Some(deal) = store.get_mut(deal_id) {
                deal.last_activity_at = now;
            }
        }
        self.stamp_activity(deal_id, now).await;
        Ok(prospect)
    }

    /// Detach a prospect and re-stamp the owning deal's activity.
    pub async fn remove_prospect(&self, prospect_id: &str) -> Result<(), BoardError> {
        let deal_id = {
            let store = self.store.lock();
            store
                .list()
                .iter()
                .find(|d| d.prospect(prospect_id).is_some())
                .map(|d| d.id.clone())
        }
        .ok_or_else(|| BoardError::ProspectNotFound(prospect_id.to_string()))?;

        self.repo.delete_prospect(prospect_id).await?;

        let now = self.clock.now();
        {
            let mut store = self.store.lock();
            store.detach_prospect_local(prospect_id);
            if let Some(deal) = store.get_mut(&deal_id) {
                deal.last_activity_at = now;
            }
        }
        self.stamp_activity(&deal_id, now).await;
        Ok(())
    }

    fn current_user(&self) -> Result<String, BoardError> {
        self.identity
            .current_user()
            .ok_or(BoardError::NotAuthenticated)
    }

    /// Persist an activity re-stamp after a prospect change. The prospect
    /// write itself is already committed, so a failure here only costs the
    /// staleness clock accuracy until the next write.
    async fn stamp_activity(&self, deal_id: &str, now: chrono::DateTime<chrono::Utc>) {
        if let Err(err) = self
            .repo
            .update_deal(deal_id, &DealPatch::activity(now))
            .await
        {
            log::warn!("activity stamp write failed for deal {deal_id}: {err}");
        }
    }

    fn deal_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.deal_locks
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
