//! Placement state and derived UI flags

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::placeable::{PlacedInstance, Placeable};
use crate::tracking::TrackingFix;
use crate::types::{InstanceId, Transform};

/// Phase of the placement state machine, derived from [`PlacementState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementPhase {
    /// Nothing selected, nothing placed
    Idle,
    /// A selection is previewed at the placement location
    Previewing,
    /// One committed instance exists
    Placed,
    /// The placed instance is under an active gesture
    Dragging,
}

/// An open drag gesture
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub dragged_object: InstanceId,
    pub initial_position: Vec3,
    pub initial_transform: Transform,
}

impl DragSession {
    pub fn new(instance: &PlacedInstance) -> Self {
        Self {
            dragged_object: instance.id,
            initial_position: instance.transform.translation,
            initial_transform: instance.transform,
        }
    }
}

/// Single mutable record of selection, placement, drag and tracking state.
///
/// At most one instance is placed at a time. The drag flag is derived from
/// the presence of a [`DragSession`], so the two can never disagree.
#[derive(Debug, Clone, Default)]
pub struct PlacementState {
    pub selected_object: Option<Placeable>,
    pub placed_object: Option<PlacedInstance>,
    pub(crate) highlighted_object: Option<InstanceId>,
    pub(crate) drag: Option<DragSession>,
    pub(crate) active_collisions: u32,
    pub device_anchor_present: bool,
    pub plane_anchors_present: bool,
    pub plane_to_project_on_found: bool,
    pub user_placed_an_object: bool,
    pub user_dragged_an_object: bool,
    pub tracking_fix: TrackingFix,
    /// A tracked reference object has matched the placed instance at least once
    pub placed_has_reference_object: bool,
}

impl PlacementState {
    pub fn new() -> Self {
        Self::default()
    }

    // ============== Selection ==============

    /// Toggle the selection.
    ///
    /// Selecting the already-selected object deselects it. Returns the
    /// selection that was replaced, so its preview can be torn down.
    pub fn select(&mut self, object: Option<Placeable>) -> Option<Placeable> {
        let previous = self.selected_object.take();

        let same = match (&previous, &object) {
            (Some(old), Some(new)) => old.file_name() == new.file_name(),
            _ => false,
        };

        self.selected_object = if same { None } else { object };
        self.active_collisions = 0;
        previous
    }

    /// The selection, if placement is currently possible
    pub fn object_to_place(&self) -> Option<&Placeable> {
        if self.is_placement_possible() {
            self.selected_object.as_ref()
        } else {
            None
        }
    }

    // ============== Collisions ==============

    pub fn active_collisions(&self) -> u32 {
        self.active_collisions
    }

    pub fn collision_detected(&self) -> bool {
        self.active_collisions > 0
    }

    /// Count a collision involving the selection's preview
    pub fn collision_began(&mut self, file_name: &str) -> bool {
        if !self.selection_matches(file_name) {
            return false;
        }
        self.active_collisions += 1;
        true
    }

    /// Release a collision involving the selection's preview
    pub fn collision_ended(&mut self, file_name: &str) -> bool {
        if !self.selection_matches(file_name) {
            return false;
        }
        if self.active_collisions == 0 {
            tracing::warn!(
                "Received a collision ended event without a corresponding collision start event"
            );
            return false;
        }
        self.active_collisions -= 1;
        true
    }

    fn selection_matches(&self, file_name: &str) -> bool {
        self.selected_object
            .as_ref()
            .is_some_and(|s| s.file_name() == file_name)
    }

    // ============== Highlight ==============

    pub fn highlighted_id(&self) -> Option<InstanceId> {
        self.highlighted_object
    }

    /// The highlighted instance, resolved against the placed object
    pub fn highlighted_instance(&self) -> Option<&PlacedInstance> {
        let id = self.highlighted_object?;
        self.placed_object.as_ref().filter(|p| p.id == id)
    }

    /// Set the highlighted instance. Returns true if the highlight changed.
    pub fn set_highlighted(&mut self, id: Option<InstanceId>) -> bool {
        if self.highlighted_object == id {
            return false;
        }
        self.highlighted_object = id;
        true
    }

    // ============== Placed instance ==============

    /// The placed instance if it has the given id
    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut PlacedInstance> {
        self.placed_object.as_mut().filter(|p| p.id == id)
    }

    pub fn instance(&self, id: InstanceId) -> Option<&PlacedInstance> {
        self.placed_object.as_ref().filter(|p| p.id == id)
    }

    /// Remove the placed instance and every piece of state that refers to it
    pub fn clear_placed(&mut self) -> Option<PlacedInstance> {
        let removed = self.placed_object.take()?;

        if self.highlighted_object == Some(removed.id) {
            self.highlighted_object = None;
        }
        if self
            .drag
            .as_ref()
            .is_some_and(|d| d.dragged_object == removed.id)
        {
            self.drag = None;
        }
        self.tracking_fix.invalidate();
        self.placed_has_reference_object = false;
        self.user_placed_an_object = false;

        Some(removed)
    }

    // ============== Drag ==============

    pub fn drag_in_progress(&self) -> bool {
        self.drag.is_some()
    }

    pub fn drag_session(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    // ============== Derived flags ==============

    /// Whether the selection's preview should be visible
    pub fn should_show_preview(&self) -> bool {
        self.device_anchor_present
            && self.plane_anchors_present
            && !self.drag_in_progress()
            && self.highlighted_object.is_none()
    }

    /// Whether the placement tooltip/affordance should be shown
    pub fn should_show_placement_ui(&self) -> bool {
        self.selected_object.is_some() && self.placed_object.is_none() && self.should_show_preview()
    }

    /// Whether committing the selection would succeed now
    pub fn is_placement_possible(&self) -> bool {
        self.selected_object.is_some()
            && self.placed_object.is_none()
            && self.should_show_preview()
            && self.plane_to_project_on_found
            && !self.collision_detected()
            && !self.drag_in_progress()
    }

    pub fn phase(&self) -> PlacementPhase {
        match (&self.placed_object, &self.drag, &self.selected_object) {
            (Some(_), Some(_), _) => PlacementPhase::Dragging,
            (Some(_), None, _) => PlacementPhase::Placed,
            (None, _, Some(_)) => PlacementPhase::Previewing,
            (None, _, None) => PlacementPhase::Idle,
        }
    }
}
