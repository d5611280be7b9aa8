//! Core data types for the deal pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BoardError;

/// Deal classification. Partner deals may carry prospect sub-records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealType {
    Customer,
    Partner,
}

impl DealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Partner => "partner",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "customer" => Some(Self::Customer),
            "partner" => Some(Self::Partner),
            _ => None,
        }
    }
}

/// A named lead associated with a partner deal. Owned by exactly one deal;
/// deleted when the parent deal is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prospect {
    pub id: String,
    pub deal_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A tracked sales opportunity. The core mutable entity, owned exclusively
/// by the `DealStore`; everything else holds transient derived views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub owner: String,
    /// Always resolves to a stage in the registry.
    pub stage_id: String,
    pub organization: String,
    pub deal_type: DealType,
    /// `None` means "value not yet known", never zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action_at: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_url: Option<String>,
    /// Re-stamped on every create, stage change, edit, or prospect change.
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prospects: Vec<Prospect>,
}

impl Deal {
    pub fn prospect(&self, prospect_id: &str) -> Option<&Prospect> {
        self.prospects.iter().find(|p| p.id == prospect_id)
    }
}

/// Fields supplied when creating a deal.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealDraft {
    pub organization: String,
    pub deal_type: DealType,
    /// Defaults to the registry's initial stage when absent.
    #[serde(default)]
    pub stage_id: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub next_action_at: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub company_url: Option<String>,
    #[serde(default)]
    pub contact_url: Option<String>,
}

impl Default for DealType {
    fn default() -> Self {
        Self::Customer
    }
}

/// Partial update for a deal. `None` leaves the field untouched; the nested
/// options distinguish "leave alone" from "clear the value".
#[derive(Debug, Clone, Default)]
pub struct DealPatch {
    pub organization: Option<String>,
    pub deal_type: Option<DealType>,
    pub stage_id: Option<String>,
    pub amount: Option<Option<f64>>,
    pub next_action_at: Option<Option<NaiveDate>>,
    pub notes: Option<Option<String>>,
    pub company_url: Option<Option<String>>,
    pub contact_url: Option<Option<String>>,
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl DealPatch {
    /// The two-field patch a stage transition writes.
    pub fn stage_change(stage_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            stage_id: Some(stage_id.to_string()),
            last_activity_at: Some(at),
            ..Self::default()
        }
    }

    /// The one-field patch that re-stamps activity after a prospect change.
    pub fn activity(at: DateTime<Utc>) -> Self {
        Self {
            last_activity_at: Some(at),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.organization.is_none()
            && self.deal_type.is_none()
            && self.stage_id.is_none()
            && self.amount.is_none()
            && self.next_action_at.is_none()
            && self.notes.is_none()
            && self.company_url.is_none()
            && self.contact_url.is_none()
            && self.last_activity_at.is_none()
    }

    /// Apply the patch to a deal in place.
    pub fn apply(&self, deal: &mut Deal) {
        if let Some(org) = &self.organization {
            deal.organization = org.clone();
        }
        if let Some(dt) = self.deal_type {
            deal.deal_type = dt;
        }
        if let Some(stage) = &self.stage_id {
            deal.stage_id = stage.clone();
        }
        if let Some(amount) = self.amount {
            deal.amount = amount;
        }
        if let Some(date) = self.next_action_at {
            deal.next_action_at = date;
        }
        if let Some(notes) = &self.notes {
            deal.notes = notes.clone();
        }
        if let Some(url) = &self.company_url {
            deal.company_url = url.clone();
        }
        if let Some(url) = &self.contact_url {
            deal.contact_url = url.clone();
        }
        if let Some(at) = self.last_activity_at {
            deal.last_activity_at = at;
        }
    }
}

/// Trim and reject an empty organization name.
pub fn validate_organization(raw: &str) -> Result<String, BoardError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(BoardError::Validation(
            "Organization name cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Reject negative or non-finite amounts. Absent amounts are valid.
pub fn validate_amount(amount: Option<f64>) -> Result<(), BoardError> {
    if let Some(value) = amount {
        if !value.is_finite() {
            return Err(BoardError::Validation(format!(
                "Amount is not a number: {value}"
            )));
        }
        if value < 0.0 {
            return Err(BoardError::Validation(format!(
                "Amount cannot be negative: {value}"
            )));
        }
    }
    Ok(())
}
