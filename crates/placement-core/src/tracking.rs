//! Reference-object tracking fusion
//!
//! Tracked reference objects report a full pose for the physical object the
//! placed instance represents. The latest pose is cached as a [`TrackingFix`]
//! and can be snapped onto the placed instance, automatically while the
//! interaction mode is [`InteractionMode::ObjectTracking`].

use std::path::Path;

use glam::Mat4;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotation::AnnotationBinder;
use crate::geometry::decompose_anchor_matrix;
use crate::modes::InteractionMode;
use crate::state::PlacementState;

/// Kind of change reported by an anchor stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorEvent {
    Added,
    Updated,
    Removed,
}

/// Anchor for a recognized reference object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceObjectAnchor {
    pub id: Uuid,
    /// Source file of the reference object, if known
    pub reference_file: Option<String>,
    pub origin_from_anchor: Mat4,
}

impl ReferenceObjectAnchor {
    /// File name (without directory and extension) of the reference object
    pub fn file_name(&self) -> Option<String> {
        let path = Path::new(self.reference_file.as_deref()?);
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
    }
}

/// One event from the reference-object tracking stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceAnchorUpdate {
    pub event: AnchorEvent,
    pub anchor: ReferenceObjectAnchor,
}

/// Cached pose of the tracked reference object matching the placed instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingFix {
    pub anchor_transform: Mat4,
    pub host_file_name: String,
    pub present: bool,
}

impl Default for TrackingFix {
    fn default() -> Self {
        Self {
            anchor_transform: Mat4::IDENTITY,
            host_file_name: String::new(),
            present: false,
        }
    }
}

impl TrackingFix {
    pub fn update(&mut self, anchor_transform: Mat4, host_file_name: impl Into<String>) {
        self.anchor_transform = anchor_transform;
        self.host_file_name = host_file_name.into();
        self.present = true;
    }

    pub fn invalidate(&mut self) {
        self.present = false;
    }
}

/// What a reference anchor event did to the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionOutcome {
    /// The event did not concern the placed instance
    Ignored,
    /// The fix was refreshed; `snapped` tells whether it was applied
    FixUpdated { snapped: bool },
    /// The fix was dropped
    FixInvalidated,
}

/// Reconcile one reference-object anchor event against the placement state
pub fn fuse_reference_update(
    state: &mut PlacementState,
    binder: &mut AnnotationBinder,
    mode: Option<InteractionMode>,
    update: &ReferenceAnchorUpdate,
) -> FusionOutcome {
    let Some(placed_name) = state.placed_object.as_ref().map(|p| p.file_name.clone()) else {
        if state.tracking_fix.present {
            state.tracking_fix.invalidate();
            return FusionOutcome::FixInvalidated;
        }
        return FusionOutcome::Ignored;
    };

    let Some(reference_name) = update.anchor.file_name() else {
        tracing::debug!("Reference anchor {} has no source file", update.anchor.id);
        return FusionOutcome::Ignored;
    };

    if reference_name != placed_name {
        return FusionOutcome::Ignored;
    }

    state.placed_has_reference_object = true;

    match update.event {
        AnchorEvent::Added | AnchorEvent::Updated => {
            state
                .tracking_fix
                .update(update.anchor.origin_from_anchor, reference_name);
            let snapped = mode == Some(InteractionMode::ObjectTracking) && snap_to_tracking_fix(state, binder);
            FusionOutcome::FixUpdated { snapped }
        }
        AnchorEvent::Removed => {
            state.tracking_fix.invalidate();
            FusionOutcome::FixInvalidated
        }
    }
}

/// Overwrite the placed instance's transform from the cached tracking fix.
///
/// No-op (returns false) if nothing is placed or no fix is present.
pub fn snap_to_tracking_fix(state: &mut PlacementState, binder: &mut AnnotationBinder) -> bool {
    if !state.tracking_fix.present {
        return false;
    }
    let transform = decompose_anchor_matrix(state.tracking_fix.anchor_transform);

    let Some(placed) = state.placed_object.as_mut() else {
        return false;
    };
    placed.transform = transform;
    binder.reproject(placed);

    tracing::debug!("Snapped '{}' to tracked pose", placed.file_name);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeable::PlacedInstance;
    use glam::{Quat, Vec3};

    fn update(event: AnchorEvent, file: &str, matrix: Mat4) -> ReferenceAnchorUpdate {
        ReferenceAnchorUpdate {
            event,
            anchor: ReferenceObjectAnchor {
                id: Uuid::new_v4(),
                reference_file: Some(format!("/objects/{file}.referenceobject")),
                origin_from_anchor: matrix,
            },
        }
    }

    fn placed_state(name: &str) -> PlacementState {
        let mut state = PlacementState::new();
        state.placed_object = Some(PlacedInstance::new(name, Vec3::splat(0.5)));
        state
    }

    #[test]
    fn test_file_name_strips_directory_and_extension() {
        let event = update(AnchorEvent::Added, "engine_block", Mat4::IDENTITY);
        assert_eq!(event.anchor.file_name().as_deref(), Some("engine_block"));
    }

    #[test]
    fn test_update_in_tracking_mode_snaps() {
        let mut state = placed_state("engine_block");
        let mut binder = AnnotationBinder::default();
        let pose = Mat4::from_rotation_translation(Quat::from_rotation_y(0.4), Vec3::new(1.0, 0.0, -2.0));

        let outcome = fuse_reference_update(
            &mut state,
            &mut binder,
            Some(InteractionMode::ObjectTracking),
            &update(AnchorEvent::Updated, "engine_block", pose),
        );

        assert_eq!(outcome, FusionOutcome::FixUpdated { snapped: true });
        let placed = state.placed_object.as_ref().unwrap();
        assert!(placed.transform.translation.abs_diff_eq(Vec3::new(1.0, 0.0, -2.0), 1e-5));
        assert!(state.placed_has_reference_object);
    }

    #[test]
    fn test_update_outside_tracking_mode_only_caches() {
        let mut state = placed_state("engine_block");
        let mut binder = AnnotationBinder::default();
        let pose = Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0));

        let outcome = fuse_reference_update(
            &mut state,
            &mut binder,
            Some(InteractionMode::Rotation),
            &update(AnchorEvent::Added, "engine_block", pose),
        );

        assert_eq!(outcome, FusionOutcome::FixUpdated { snapped: false });
        assert!(state.tracking_fix.present);
        assert_eq!(state.placed_object.as_ref().unwrap().position(), Vec3::ZERO);
    }

    #[test]
    fn test_removed_event_makes_snap_a_no_op() {
        let mut state = placed_state("engine_block");
        let mut binder = AnnotationBinder::default();
        let pose = Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0));

        fuse_reference_update(&mut state, &mut binder, None, &update(AnchorEvent::Added, "engine_block", pose));
        let outcome = fuse_reference_update(
            &mut state,
            &mut binder,
            None,
            &update(AnchorEvent::Removed, "engine_block", pose),
        );
        assert_eq!(outcome, FusionOutcome::FixInvalidated);

        let before = state.placed_object.as_ref().unwrap().transform;
        assert!(!snap_to_tracking_fix(&mut state, &mut binder));
        assert_eq!(state.placed_object.as_ref().unwrap().transform, before);
    }

    #[test]
    fn test_other_reference_object_is_ignored() {
        let mut state = placed_state("engine_block");
        let mut binder = AnnotationBinder::default();

        let outcome = fuse_reference_update(
            &mut state,
            &mut binder,
            Some(InteractionMode::ObjectTracking),
            &update(AnchorEvent::Added, "gearbox", Mat4::IDENTITY),
        );
        assert_eq!(outcome, FusionOutcome::Ignored);
        assert!(!state.tracking_fix.present);
    }

    #[test]
    fn test_fix_invalidated_when_nothing_placed() {
        let mut state = PlacementState::new();
        let mut binder = AnnotationBinder::default();
        state.tracking_fix.update(Mat4::IDENTITY, "engine_block");

        let outcome = fuse_reference_update(
            &mut state,
            &mut binder,
            None,
            &update(AnchorEvent::Updated, "engine_block", Mat4::IDENTITY),
        );
        assert_eq!(outcome, FusionOutcome::FixInvalidated);
        assert!(!state.tracking_fix.present);
    }
}
