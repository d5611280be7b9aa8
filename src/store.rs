//! In-memory deal collection.
//!
//! The store is the single source of truth for the board. It is purely a
//! container: mutations never perform I/O, persistence is the engine's
//! responsibility. Deals are kept most-recent-created first, matching the
//! order a fresh fetch returns.

use crate::types::{Deal, Prospect};

#[derive(Debug, Default)]
pub struct DealStore {
    deals: Vec<Deal>,
}

impl DealStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All deals, most-recent-created first.
    pub fn list(&self) -> &[Deal] {
        &self.deals
    }

    pub fn get(&self, id: &str) -> Option<&Deal> {
        self.deals.iter().find(|d| d.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Deal> {
        self.deals.iter_mut().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.deals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    /// Replace a deal by id, or insert it in creation order.
    pub fn upsert_local(&mut self, deal: Deal) {
        if let Some(idx) = self.deals.iter().position(|d| d.id == deal.id) {
            self.deals[idx] = deal;
            return;
        }
        let at = self
            .deals
            .iter()
            .position(|d| d.created_at <= deal.created_at)
            .unwrap_or(self.deals.len());
        self.deals.insert(at, deal);
    }

    pub fn remove_local(&mut self, id: &str) -> Option<Deal> {
        let idx = self.deals.iter().position(|d| d.id == id)?;
        Some(self.deals.remove(idx))
    }

    /// Swap in a freshly fetched collection (initial load or rollback reload).
    pub fn replace_all(&mut self, mut deals: Vec<Deal>) {
        deals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.deals = deals;
    }

    /// Attach a prospect to its parent deal. Returns false when the parent
    /// is not present.
    pub fn attach_prospect_local(&mut self, prospect: Prospect) -> bool {
        match self.get_mut(&prospect.deal_id) {
            Some(deal) => {
                deal.prospects.retain(|p| p.id != prospect.id);
                deal.prospects.push(prospect);
                true
            }
            None => false,
        }
    }

    /// Detach a prospect by id. Returns the owning deal id when found.
    pub fn detach_prospect_local(&mut self, prospect_id: &str) -> Option<String> {
        for deal in &mut self.deals {
            if let Some(idx) = deal.prospects.iter().position(|p| p.id == prospect_id) {
                deal.prospects.remove(idx);
                return Some(deal.id.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DealType;
    use chrono::{TimeZone, Utc};

    fn deal(id: &str, created_day: u32) -> Deal {
        let at = Utc.with_ymd_and_hms(2024, 6, created_day, 9, 0, 0).unwrap();
        Deal {
            id: id.to_string(),
            owner: "u1".to_string(),
            stage_id: "lead".to_string(),
            organization: format!("Org {id}"),
            deal_type: DealType::Customer,
            amount: None,
            next_action_at: None,
            notes: None,
            company_url: None,
            contact_url: None,
            last_activity_at: at,
            created_at: at,
            prospects: Vec::new(),
        }
    }

    fn prospect(id: &str, deal_id: &str) -> Prospect {
        Prospect {
            id: id.to_string(),
            deal_id: deal_id.to_string(),
            name: "Lead".to_string(),
            notes: None,
        }
    }

    #[test]
    fn list_orders_most_recent_created_first() {
        let mut store = DealStore::new();
        store.upsert_local(deal("old", 1));
        store.upsert_local(deal("new", 10));
        store.upsert_local(deal("mid", 5));
        let ids: Vec<&str> = store.list().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut store = DealStore::new();
        store.upsert_local(deal("a", 1));
        let mut edited = deal("a", 1);
        edited.organization = "Renamed".to_string();
        store.upsert_local(edited);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().organization, "Renamed");
    }

    #[test]
    fn replace_all_sorts_fetched_order() {
        let mut store = DealStore::new();
        store.upsert_local(deal("stale", 1));
        store.replace_all(vec![deal("x", 2), deal("y", 9)]);
        let ids: Vec<&str> = store.list().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["y", "x"]);
        assert!(store.get("stale").is_none());
    }

    #[test]
    fn prospect_attach_detach_scoped_to_parent() {
        let mut store = DealStore::new();
        store.upsert_local(deal("a", 1));
        assert!(store.attach_prospect_local(prospect("p1", "a")));
        assert!(!store.attach_prospect_local(prospect("p2", "missing")));
        assert_eq!(store.get("a").unwrap().prospects.len(), 1);

        assert_eq!(store.detach_prospect_local("p1").as_deref(), Some("a"));
        assert!(store.detach_prospect_local("p1").is_none());
        assert!(store.get("a").unwrap().prospects.is_empty());
    }

    #[test]
    fn remove_local_returns_removed_deal() {
        let mut store = DealStore::new();
        store.upsert_local(deal("a", 1));
        assert_eq!(store.remove_local("a").unwrap().id, "a");
        assert!(store.remove_local("a").is_none());
        assert!(store.is_empty());
    }
}
