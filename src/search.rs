//! Organization search filter.
//!
//! Applied before per-stage grouping so empty columns render as empty during
//! an active search. Pure: never mutates the store.

use crate::types::Deal;

/// Narrow the visible deal set by a case-insensitive substring match on
/// organization name. Empty or whitespace queries return the full input
/// unchanged, preserving order.
pub fn filter_by_organization<'a>(deals: &'a [Deal], query: &str) -> Vec<&'a Deal> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return deals.iter().collect();
    }
    deals
        .iter()
        .filter(|d| d.organization.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DealType;
    use chrono::{TimeZone, Utc};

    fn deal(id: &str, organization: &str) -> Deal {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        Deal {
            id: id.to_string(),
            owner: "u1".to_string(),
            stage_id: "lead".to_string(),
            organization: organization.to_string(),
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

    #[test]
    fn empty_query_returns_identical_ordered_list() {
        let deals = vec![deal("a", "Zeta"), deal("b", "Alpha")];
        let out = filter_by_organization(&deals, "   ");
        let ids: Vec<&str> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn match_is_case_insensitive_substring() {
        let deals = vec![deal("a", "ACME Corp"), deal("b", "Initech")];
        let out = filter_by_organization(&deals, "acme");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn no_match_returns_empty() {
        let deals = vec![deal("a", "ACME Corp")];
        assert!(filter_by_organization(&deals, "globex").is_empty());
    }
}
