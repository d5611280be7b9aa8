//! Drag-and-drop reconciliation.
//!
//! The coordinator is a small state machine (`Idle` ↔ `Dragging`) that turns
//! a pointer gesture into at most one stage change. The payload lives in the
//! coordinator for the duration of the drag session rather than in any
//! column-level state, so an abandoned drag cannot leave dangling state.
//!
//! Visual drag-over highlighting is the caller's concern, but the enter/leave
//! bookkeeping it needs is here: `HoverTracker` keeps a per-column depth
//! count so nested child elements firing enter/leave out of order never make
//! a column flicker to "not hovered" while the pointer is still inside it.

use std::collections::HashMap;

/// Transfer payload captured at drag-start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragPayload {
    pub deal_id: String,
    pub source_stage_id: String,
}

/// A resolved drop: the single stage change the gesture asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDrop {
    pub deal_id: String,
    pub target_stage_id: String,
}

#[derive(Debug, Default)]
enum DragState {
    #[default]
    Idle,
    Dragging(DragPayload),
}

#[derive(Debug, Default)]
pub struct DragCoordinator {
    state: DragState,
}

impl DragCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn payload(&self) -> Option<&DragPayload> {
        match &self.state {
            DragState::Dragging(payload) => Some(payload),
            DragState::Idle => None,
        }
    }

    /// Begin a drag session. A drag started while another is in flight
    /// replaces it; the platform only delivers one drag session at a time.
    pub fn drag_start(&mut self, deal_id: &str, source_stage_id: &str) {
        self.state = DragState::Dragging(DragPayload {
            deal_id: deal_id.to_string(),
            source_stage_id: source_stage_id.to_string(),
        });
    }

    /// Resolve a drop over a stage column. Returns the stage change to apply,
    /// or `None` for a no-op drop (same source and target stage) or a drop
    /// with no drag in flight. Always returns to `Idle`.
    pub fn drop_on(&mut self, target_stage_id: &str) -> Option<StageDrop> {
        let payload = match std::mem::take(&mut self.state) {
            DragState::Dragging(payload) => payload,
            DragState::Idle => return None,
        };
        if payload.source_stage_id == target_stage_id {
            log::debug!(
                "drop on source stage {} ignored for deal {}",
                target_stage_id,
                payload.deal_id
            );
            return None;
        }
        Some(StageDrop {
            deal_id: payload.deal_id,
            target_stage_id: target_stage_id.to_string(),
        })
    }

    /// Drag ended without a valid drop. No side effect.
    pub fn drag_end(&mut self) {
        self.state = DragState::Idle;
    }
}

/// Per-column hover depth accounting for drag-over feedback.
///
/// Enter/leave events from nested elements may arrive out of order; a column
/// only counts as "not hovered" once its depth returns to zero, i.e. the
/// pointer left the column's full bounding region.
#[derive(Debug, Default)]
pub struct HoverTracker {
    depth: HashMap<String, u32>,
}

impl HoverTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an enter event. Returns true while the column is hovered.
    pub fn enter(&mut self, stage_id: &str) -> bool {
        let depth = self.depth.entry(stage_id.to_string()).or_insert(0);
        *depth += 1;
        true
    }

    /// Record a leave event. Returns true while the column is still hovered.
    pub fn leave(&mut self, stage_id: &str) -> bool {
        match self.depth.get_mut(stage_id) {
            Some(depth) => {
                *depth = depth.saturating_sub(1);
                if *depth == 0 {
                    self.depth.remove(stage_id);
                    false
                } else {
                    true
                }
            }
            // Stray leave with no matching enter.
            None => false,
        }
    }

    pub fn is_hovered(&self, stage_id: &str) -> bool {
        self.depth.get(stage_id).is_some_and(|d| *d > 0)
    }

    /// Reset all columns, used when a drag session ends.
    pub fn clear(&mut self) {
        self.depth.clear();
    }
}
