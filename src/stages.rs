//! Pipeline stage registry.
//!
//! Stages are defined once at startup and never change afterwards. The
//! ordered sequence defines both the kanban column order and the
//! forward/backward adjacency used for single-step stage navigation. The
//! highest-position stage is the terminal "won" stage.

use serde::{Deserialize, Serialize};

use crate::error::BoardError;

/// One named step in the fixed pipeline sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: String,
    pub name: String,
    pub position: u32,
}

impl Stage {
    pub fn new(id: &str, name: &str, position: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            position,
        }
    }
}

/// Ordered, immutable collection of pipeline stages.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    stages: Vec<Stage>,
}

impl StageRegistry {
    /// Build a registry from a stage list. Stages are sorted by position;
    /// duplicate ids or positions, and empty lists, are rejected.
    pub fn new(mut stages: Vec<Stage>) -> Result<Self, BoardError> {
        if stages.is_empty() {
            return Err(BoardError::Validation(
                "Stage registry cannot be empty".to_string(),
            ));
        }
        stages.sort_by_key(|s| s.position);
        for pair in stages.windows(2) {
            if pair[0].position == pair[1].position {
                return Err(BoardError::Validation(format!(
                    "Duplicate stage position: {}",
                    pair[0].position
                )));
            }
        }
        for (i, stage) in stages.iter().enumerate() {
            if stages[i + 1..].iter().any(|other| other.id == stage.id) {
                return Err(BoardError::Validation(format!(
                    "Duplicate stage id: {}",
                    stage.id
                )));
            }
        }
        Ok(Self { stages })
    }

    /// The standard five-stage sales pipeline.
    pub fn standard() -> Self {
        Self::new(vec![
            Stage::new("lead", "Lead", 0),
            Stage::new("contacted", "Contacted", 1),
            Stage::new("demo", "Demo", 2),
            Stage::new("proposal", "Proposal", 3),
            Stage::new("won", "Won", 4),
        ])
        .expect("standard pipeline is valid")
    }

    /// Stages in column order.
    pub fn ordered(&self) -> &[Stage] {
        &self.stages
    }

    pub fn get(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// The stage new deals land in unless one is chosen explicitly.
    pub fn initial(&self) -> &Stage {
        &self.stages[0]
    }

    /// The terminal stage; deals here count toward won value, not pipeline.
    pub fn won(&self) -> &Stage {
        self.stages.last().expect("registry is never empty")
    }

    pub fn is_won(&self, stage_id: &str) -> bool {
        self.won().id == stage_id
    }

    /// The stage one step forward of `id`, if any.
    pub fn next(&self, id: &str) -> Option<&Stage> {
        let idx = self.stages.iter().position(|s| s.id == id)?;
        self.stages.get(idx + 1)
    }

    /// The stage one step backward of `id`, if any.
    pub fn prev(&self, id: &str) -> Option<&Stage> {
        let idx = self.stages.iter().position(|s| s.id == id)?;
        idx.checked_sub(1).and_then(|i| self.stages.get(i))
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
