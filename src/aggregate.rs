//! Read-side projections over the deal collection.
//!
//! Everything here is pure and recomputed on every call. The working set is
//! a personal pipeline, small enough that a memoization layer would buy
//! nothing; callers rerun these after each store change.
//!
//! Amount semantics: an absent amount means "value not yet known". It
//! contributes 0 to value sums but the deal still counts toward stage
//! cardinality, funnel counts, and the type distribution.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::stages::{Stage, StageRegistry};
use crate::types::{Deal, DealType};

/// How many whole days without activity before a non-won deal is stale.
pub const STALE_AFTER_DAYS: i64 = 14;

/// One kanban column: a stage with its deals and value total.
#[derive(Debug)]
pub struct StageColumn<'a> {
    pub stage: &'a Stage,
    pub deals: Vec<&'a Deal>,
    pub total_value: f64,
}

/// Partition deals by stage, in registry column order. Each deal's relative
/// order from the source list is preserved. Deals whose stage id is not in
/// the registry are dropped (the engine never produces any).
pub fn group_by_stage<'a>(registry: &'a StageRegistry, deals: &[&'a Deal]) -> Vec<StageColumn<'a>> {
    registry
        .ordered()
        .iter()
        .map(|stage| {
            let in_stage: Vec<&Deal> = deals
                .iter()
                .copied()
                .filter(|d| d.stage_id == stage.id)
                .collect();
            let total_value = value_sum(in_stage.iter().copied());
            StageColumn {
                stage,
                deals: in_stage,
                total_value,
            }
        })
        .collect()
}

fn value_sum<'a>(deals: impl Iterator<Item = &'a Deal>) -> f64 {
    deals.map(|d| d.amount.unwrap_or(0.0)).sum()
}

/// Sum of amounts over all deals not yet in the won stage.
pub fn pipeline_value(registry: &StageRegistry, deals: &[Deal]) -> f64 {
    value_sum(deals.iter().filter(|d| !registry.is_won(&d.stage_id)))
}

/// Sum of amounts over deals in the won stage.
pub fn won_value(registry: &StageRegistry, deals: &[Deal]) -> f64 {
    value_sum(deals.iter().filter(|d| registry.is_won(&d.stage_id)))
}

/// A deal is overdue when its next action date is strictly before today.
/// Both sides are date-only; time of day never participates.
pub fn is_overdue(deal: &Deal, today: NaiveDate) -> bool {
    deal.next_action_at.is_some_and(|date| date < today)
}

/// A deal's next action falls on the current day.
pub fn is_due_today(deal: &Deal, today: NaiveDate) -> bool {
    deal.next_action_at.is_some_and(|date| date == today)
}

/// A non-won deal is stale after `STALE_AFTER_DAYS` whole days without
/// activity. Won deals are never stale.
pub fn is_stale(registry: &StageRegistry, deal: &Deal, now: DateTime<Utc>) -> bool {
    if registry.is_won(&deal.stage_id) {
        return false;
    }
    now.signed_duration_since(deal.last_activity_at).num_days() >= STALE_AFTER_DAYS
}

pub fn overdue_count(deals: &[Deal], today: NaiveDate) -> usize {
    deals.iter().filter(|d| is_overdue(d, today)).count()
}

pub fn stale_count(registry: &StageRegistry, deals: &[Deal], now: DateTime<Utc>) -> usize {
    deals.iter().filter(|d| is_stale(registry, d, now)).count()
}

/// One non-won stage's share of all non-won deals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelSlice<'a> {
    pub stage: &'a Stage,
    pub count: usize,
    /// `round(100 * count / total_non_won)`; 0 when there are no non-won deals.
    pub percent: u32,
}

/// Funnel percentages per non-won stage, in column order.
pub fn funnel<'a>(registry: &'a StageRegistry, deals: &[Deal]) -> Vec<FunnelSlice<'a>> {
    let total_non_won = deals
        .iter()
        .filter(|d| !registry.is_won(&d.stage_id))
        .count();

    registry
        .ordered()
        .iter()
        .filter(|stage| !registry.is_won(&stage.id))
        .map(|stage| {
            let count = deals.iter().filter(|d| d.stage_id == stage.id).count();
            let percent = if total_non_won == 0 {
                0
            } else {
                (100.0 * count as f64 / total_non_won as f64).round() as u32
            };
            FunnelSlice {
                stage,
                count,
                percent,
            }
        })
        .collect()
}

/// Deal counts per type, for the proportional donut. Count-weighted, never
/// value-weighted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDistribution {
    pub customer: usize,
    pub partner: usize,
}

impl TypeDistribution {
    pub fn total(&self) -> usize {
        self.customer + self.partner
    }

    /// Proportion of a type's count over the total, 0.0 when empty.
    pub fn share(&self, deal_type: DealType) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let count = match deal_type {
            DealType::Customer => self.customer,
            DealType::Partner => self.partner,
        };
        count as f64 / total as f64
    }
}

pub fn type_distribution(deals: &[Deal]) -> TypeDistribution {
    let customer = deals
        .iter()
        .filter(|d| d.deal_type == DealType::Customer)
        .count();
    TypeDistribution {
        customer,
        partner: deals.len() - customer,
    }
}

/// The headline figures recomputed on every board change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardMetrics {
    pub total_deals: usize,
    pub pipeline_value: f64,
    pub won_value: f64,
    pub overdue: usize,
    pub stale: usize,
}

pub fn board_metrics(
    registry: &StageRegistry,
    deals: &[Deal],
    now: DateTime<Utc>,
    today: NaiveDate,
) -> BoardMetrics {
    BoardMetrics {
        total_deals: deals.len(),
        pipeline_value: pipeline_value(registry, deals),
        won_value: won_value(registry, deals),
        overdue: overdue_count(deals, today),
        stale: stale_count(registry, deals, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn deal(id: &str, stage_id: &str, amount: Option<f64>) -> Deal {
        Deal {
            id: id.to_string(),
            owner: "u1".to_string(),
            stage_id: stage_id.to_string(),
            organization: format!("Org {id}"),
            deal_type: DealType::Customer,
            amount,
            next_action_at: None,
            notes: None,
            company_url: None,
            contact_url: None,
            last_activity_at: fixed_now(),
            created_at: fixed_now(),
            prospects: Vec::new(),
        }
    }

    #[test]
    fn grouping_preserves_source_order_and_counts_unvalued_deals() {
        let registry = StageRegistry::standard();
        let deals = vec![
            deal("a", "lead", Some(100.0)),
            deal("b", "lead", None),
            deal("c", "proposal", Some(50.0)),
        ];
        let refs: Vec<&Deal> = deals.iter().collect();
        let columns = group_by_stage(&registry, &refs);

        let lead = columns.iter().find(|c| c.stage.id == "lead").unwrap();
        let ids: Vec<&str> = lead.deals.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        // Absent amounts contribute 0 but the deal still counts.
        assert_eq!(lead.total_value, 100.0);
        assert_eq!(lead.deals.len(), 2);

        let demo = columns.iter().find(|c| c.stage.id == "demo").unwrap();
        assert!(demo.deals.is_empty());
    }

    #[test]
    fn stage_totals_equal_pipeline_plus_won() {
        let registry = StageRegistry::standard();
        let deals = vec![
            deal("a", "lead", Some(100.0)),
            deal("b", "demo", None),
            deal("c", "proposal", Some(250.0)),
            deal("d", "won", Some(400.0)),
        ];
        let refs: Vec<&Deal> = deals.iter().collect();
        let column_sum: f64 = group_by_stage(&registry, &refs)
            .iter()
            .map(|c| c.total_value)
            .sum();
        assert_eq!(
            column_sum,
            pipeline_value(&registry, &deals) + won_value(&registry, &deals)
        );
        assert_eq!(pipeline_value(&registry, &deals), 350.0);
        assert_eq!(won_value(&registry, &deals), 400.0);
    }

    #[test]
    fn overdue_is_strictly_before_today() {
        let mut yesterday = deal("a", "lead", None);
        yesterday.next_action_at = NaiveDate::from_ymd_opt(2024, 6, 14);
        assert!(is_overdue(&yesterday, today()));
        assert!(!is_due_today(&yesterday, today()));

        let mut same_day = deal("b", "lead", None);
        same_day.next_action_at = NaiveDate::from_ymd_opt(2024, 6, 15);
        assert!(!is_overdue(&same_day, today()));
        assert!(is_due_today(&same_day, today()));

        let no_date = deal("c", "lead", None);
        assert!(!is_overdue(&no_date, today()));
    }

    #[test]
    fn stale_excludes_won_deals() {
        let registry = StageRegistry::standard();
        let mut idle = deal("a", "demo", None);
        idle.last_activity_at = fixed_now() - Duration::days(15);
        assert!(is_stale(&registry, &idle, fixed_now()));

        let mut won_idle = idle.clone();
        won_idle.stage_id = "won".to_string();
        assert!(!is_stale(&registry, &won_idle, fixed_now()));

        let mut fresh = deal("b", "demo", None);
        fresh.last_activity_at = fixed_now() - Duration::days(13);
        assert!(!is_stale(&registry, &fresh, fixed_now()));
    }

    #[test]
    fn funnel_percentages_sum_to_roughly_100() {
        let registry = StageRegistry::standard();
        let deals = vec![
            deal("a", "lead", None),
            deal("b", "lead", None),
            deal("c", "contacted", None),
            deal("d", "proposal", None),
            deal("e", "won", None),
        ];
        let slices = funnel(&registry, &deals);
        // Won stage is excluded from the funnel.
        assert!(slices.iter().all(|s| s.stage.id != "won"));

        let sum: u32 = slices.iter().map(|s| s.percent).sum();
        assert!((99..=101).contains(&sum), "sum was {sum}");

        let lead = slices.iter().find(|s| s.stage.id == "lead").unwrap();
        assert_eq!(lead.count, 2);
        assert_eq!(lead.percent, 50);
    }

    #[test]
    fn funnel_is_all_zero_with_no_non_won_deals() {
        let registry = StageRegistry::standard();
        let deals = vec![deal("a", "won", Some(10.0))];
        for slice in funnel(&registry, &deals) {
            assert_eq!(slice.percent, 0);
            assert_eq!(slice.count, 0);
        }
        assert!(funnel(&registry, &[]).iter().all(|s| s.percent == 0));
    }

    #[test]
    fn type_distribution_is_count_weighted() {
        let mut partner = deal("a", "lead", Some(1_000_000.0));
        partner.deal_type = DealType::Partner;
        let deals = vec![partner, deal("b", "lead", None), deal("c", "demo", None)];

        let dist = type_distribution(&deals);
        assert_eq!(dist.customer, 2);
        assert_eq!(dist.partner, 1);
        // Value plays no role in proportions.
        assert!((dist.share(DealType::Partner) - 1.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(type_distribution(&[]).share(DealType::Customer), 0.0);
    }

    #[test]
    fn board_metrics_bundles_headline_figures() {
        let registry = StageRegistry::standard();
        let mut overdue = deal("a", "lead", Some(100.0));
        overdue.next_action_at = NaiveDate::from_ymd_opt(2024, 6, 1);
        let mut stale = deal("b", "demo", None);
        stale.last_activity_at = fixed_now() - Duration::days(20);
        let deals = vec![overdue, stale, deal("c", "won", Some(50.0))];

        let metrics = board_metrics(&registry, &deals, fixed_now(), today());
        assert_eq!(metrics.total_deals, 3);
        assert_eq!(metrics.pipeline_value, 100.0);
        assert_eq!(metrics.won_value, 50.0);
        assert_eq!(metrics.overdue, 1);
        assert_eq!(metrics.stale, 1);
    }
}
