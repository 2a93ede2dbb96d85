//! Gesture-driven transform updates on the placed instance

use glam::{Quat, Vec3};

use crate::annotation::AnnotationBinder;
use crate::geometry::SurfacePlane;
use crate::modes::InteractionMode;
use crate::policy::DragPolicy;
use crate::state::{DragSession, PlacementState};
use crate::types::InstanceId;

/// Turns gesture deltas into constrained moves of the dragged instance.
///
/// Deltas are always relative to the gesture start, expressed in world
/// space. Every applied update re-projects the instance's annotations.
#[derive(Debug, Clone, Default)]
pub struct DragEngine {
    policy: DragPolicy,
}

impl DragEngine {
    pub fn new(policy: DragPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DragPolicy {
        &self.policy
    }

    /// Apply a free-plane drag sample to `target`.
    ///
    /// The vertical coordinate stays at its value from the drag start. If a
    /// drag on another target is still open it is ended first. Returns false
    /// if the target is not the placed instance.
    pub fn update_free_drag(
        &self,
        state: &mut PlacementState,
        binder: &mut AnnotationBinder,
        target: InstanceId,
        world_delta: Vec3,
        planes: &[SurfacePlane],
    ) -> bool {
        if state
            .drag
            .as_ref()
            .is_some_and(|d| d.dragged_object != target)
        {
            tracing::warn!("A new drag started but the previous one never ended - ending that one now.");
            self.end_drag(state);
        }

        if state.drag.is_none() {
            let Some(instance) = state.instance_mut(target) else {
                tracing::warn!("Unable to start drag - failed to identify the dragged object.");
                return false;
            };
            instance.is_being_dragged = true;
            let session = DragSession::new(instance);
            tracing::debug!("Started dragging {}", instance.file_name);
            state.drag = Some(session);
            state.user_dragged_an_object = true;
        }

        let Some(initial) = state.drag.as_ref().map(|d| d.initial_position) else {
            return false;
        };
        let snap = self.policy.snap_to_planes;
        let max_snap_distance = self.policy.snap_to_plane_distance;

        let Some(instance) = state.instance_mut(target) else {
            return false;
        };

        let mut position = Vec3::new(
            initial.x + world_delta.x,
            initial.y,
            initial.z + world_delta.z,
        );
        if snap {
            if let Some(plane) = nearest_plane(planes, position, max_snap_distance) {
                position = plane.project(position);
            }
        }
        instance.transform.translation = position;

        binder.reproject(instance);
        true
    }

    /// Apply a mode-constrained drag sample to the placed instance.
    ///
    /// Rotation turns by a fixed step whose direction follows the sign of
    /// `world_delta.x`. The move modes offset one world axis from the drag
    /// start. ObjectTracking never moves anything manually.
    pub fn update_mode_drag(
        &self,
        state: &mut PlacementState,
        binder: &mut AnnotationBinder,
        mode: Option<InteractionMode>,
        world_delta: Vec3,
    ) -> bool {
        let Some(mode) = mode else {
            tracing::warn!("No mode selected. Ignoring drag gesture.");
            return false;
        };

        if state.drag.is_none() {
            let Some(instance) = state.placed_object.as_mut() else {
                tracing::warn!("No object to drag.");
                return false;
            };
            instance.is_being_dragged = true;
            tracing::debug!("Started dragging {} ({})", instance.file_name, mode.label());
            state.drag = Some(DragSession::new(instance));
            state.user_dragged_an_object = true;
        }

        let Some(session) = state.drag.clone() else {
            return false;
        };
        let Some(instance) = state.instance_mut(session.dragged_object) else {
            tracing::warn!("Dragged object is no longer placed");
            return false;
        };

        match mode {
            InteractionMode::Rotation => {
                let direction = if world_delta.x > 0.0 { 1.0 } else { -1.0 };
                let step = Quat::from_rotation_y(self.policy.rotation_speed * direction);
                instance.transform.rotation = (instance.transform.rotation * step).normalize();
            }
            InteractionMode::ForwardBack => {
                instance.transform.translation.z = session.initial_position.z + world_delta.z;
            }
            InteractionMode::LeftRight => {
                instance.transform.translation.x = session.initial_position.x + world_delta.x;
            }
            InteractionMode::ObjectTracking => {}
        }

        binder.reproject(instance);
        true
    }

    /// Close the open drag. Returns false if none was open.
    pub fn end_drag(&self, state: &mut PlacementState) -> bool {
        let Some(session) = state.drag.take() else {
            tracing::warn!("Cannot end drag: no drag in progress");
            return false;
        };
        if let Some(instance) = state.instance_mut(session.dragged_object) {
            instance.is_being_dragged = false;
            tracing::debug!("Ended dragging {}", instance.file_name);
        }
        true
    }
}

fn nearest_plane(planes: &[SurfacePlane], position: Vec3, max_distance: f32) -> Option<&SurfacePlane> {
    planes
        .iter()
        .filter(|p| p.distance_to(position) <= max_distance)
        .min_by(|a, b| a.distance_to(position).total_cmp(&b.distance_to(position)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeable::PlacedInstance;
    use crate::types::Transform;
    use approx::assert_relative_eq;

    fn placed_state(position: Vec3) -> (PlacementState, InstanceId) {
        let mut instance = PlacedInstance::new("valve", Vec3::splat(0.3));
        instance.transform = Transform::from_translation(position);
        let id = instance.id;
        let state = PlacementState {
            placed_object: Some(instance),
            ..Default::default()
        };
        (state, id)
    }

    fn position(state: &PlacementState) -> Vec3 {
        state.placed_object.as_ref().unwrap().position()
    }

    #[test]
    fn test_free_drag_locks_vertical_axis() {
        let engine = DragEngine::default();
        let mut binder = AnnotationBinder::default();
        let (mut state, id) = placed_state(Vec3::new(0.0, 0.8, -1.0));

        for i in 0..20 {
            let delta = Vec3::new(i as f32 * 0.05, (i as f32).sin(), -0.02 * i as f32);
            assert!(engine.update_free_drag(&mut state, &mut binder, id, delta, &[]));
            assert_relative_eq!(position(&state).y, 0.8);
        }

        let last = position(&state);
        assert_relative_eq!(last.x, 0.95, epsilon = 1e-5);
        assert_relative_eq!(last.z, -1.38, epsilon = 1e-5);
        assert!(state.drag_in_progress());
        assert!(state.user_dragged_an_object);
    }

    #[test]
    fn test_free_drag_on_unknown_target_is_no_op() {
        let engine = DragEngine::default();
        let mut binder = AnnotationBinder::default();
        let (mut state, _) = placed_state(Vec3::ZERO);

        assert!(!engine.update_free_drag(&mut state, &mut binder, InstanceId::new(), Vec3::X, &[]));
        assert!(!state.drag_in_progress());
        assert_eq!(position(&state), Vec3::ZERO);
    }

    #[test]
    fn test_drag_on_other_target_ends_open_drag() {
        let engine = DragEngine::default();
        let mut binder = AnnotationBinder::default();
        let (mut state, id) = placed_state(Vec3::ZERO);

        engine.update_free_drag(&mut state, &mut binder, id, Vec3::X, &[]);
        assert!(state.placed_object.as_ref().unwrap().is_being_dragged);

        assert!(!engine.update_free_drag(&mut state, &mut binder, InstanceId::new(), Vec3::Z, &[]));
        assert!(!state.placed_object.as_ref().unwrap().is_being_dragged);
        assert!(!state.drag_in_progress());

        // A fresh drag starts from where the ended one left the object
        assert!(engine.update_free_drag(&mut state, &mut binder, id, Vec3::Z, &[]));
        assert_eq!(position(&state), Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn test_end_drag_clears_flag_and_is_idempotent() {
        let engine = DragEngine::default();
        let mut binder = AnnotationBinder::default();
        let (mut state, id) = placed_state(Vec3::ZERO);

        engine.update_free_drag(&mut state, &mut binder, id, Vec3::X, &[]);
        assert!(engine.end_drag(&mut state));
        assert!(!state.placed_object.as_ref().unwrap().is_being_dragged);
        assert!(!state.drag_in_progress());
        assert!(!engine.end_drag(&mut state));
    }

    #[test]
    fn test_rotation_uses_constant_step_by_sign() {
        let engine = DragEngine::default();
        let mut binder = AnnotationBinder::default();
        let (mut state, _) = placed_state(Vec3::ZERO);

        let rotation = |state: &PlacementState| state.placed_object.as_ref().unwrap().transform.rotation;

        engine.update_mode_drag(&mut state, &mut binder, Some(InteractionMode::Rotation), Vec3::new(5.0, 0.0, 0.0));
        assert!(rotation(&state).abs_diff_eq(Quat::from_rotation_y(0.006), 1e-6));

        // A tiny and a large negative delta turn by the same step
        engine.update_mode_drag(&mut state, &mut binder, Some(InteractionMode::Rotation), Vec3::new(-0.001, 0.0, 0.0));
        engine.update_mode_drag(&mut state, &mut binder, Some(InteractionMode::Rotation), Vec3::new(-9.0, 0.0, 0.0));
        assert!(rotation(&state).abs_diff_eq(Quat::from_rotation_y(-0.006), 1e-6));
    }

    #[test]
    fn test_axis_modes_move_one_axis_from_start() {
        let engine = DragEngine::default();
        let mut binder = AnnotationBinder::default();
        let (mut state, _) = placed_state(Vec3::new(1.0, 0.5, -1.0));
        let delta = Vec3::new(0.3, 0.4, 0.2);

        engine.update_mode_drag(&mut state, &mut binder, Some(InteractionMode::ForwardBack), delta);
        engine.update_mode_drag(&mut state, &mut binder, Some(InteractionMode::ForwardBack), delta);
        assert!(position(&state).abs_diff_eq(Vec3::new(1.0, 0.5, -0.8), 1e-6));

        engine.update_mode_drag(&mut state, &mut binder, Some(InteractionMode::LeftRight), delta);
        assert!(position(&state).abs_diff_eq(Vec3::new(1.3, 0.5, -0.8), 1e-6));

        engine.update_mode_drag(&mut state, &mut binder, Some(InteractionMode::ObjectTracking), delta);
        assert!(position(&state).abs_diff_eq(Vec3::new(1.3, 0.5, -0.8), 1e-6));
    }

    #[test]
    fn test_mode_drag_without_mode_or_object_is_no_op() {
        let engine = DragEngine::default();
        let mut binder = AnnotationBinder::default();
        let (mut state, _) = placed_state(Vec3::ZERO);
        assert!(!engine.update_mode_drag(&mut state, &mut binder, None, Vec3::X));
        assert!(!state.drag_in_progress());

        let mut empty = PlacementState::new();
        assert!(!engine.update_mode_drag(&mut empty, &mut binder, Some(InteractionMode::LeftRight), Vec3::X));
    }

    #[test]
    fn test_drag_reprojects_annotations() {
        let engine = DragEngine::default();
        let mut binder = AnnotationBinder::default();
        let (mut state, id) = placed_state(Vec3::ZERO);

        let host = state.placed_object.clone().unwrap();
        binder.show_preview(&host, Vec3::new(0.15, 0.1, 0.0), "Rust", "");
        let annotation = binder.commit(&host).unwrap();

        engine.update_free_drag(&mut state, &mut binder, id, Vec3::new(1.0, 0.0, 2.0), &[]);
        let moved = state.placed_object.as_ref().unwrap();
        let annotation = binder.get(annotation).unwrap();
        assert!(annotation.world_position.abs_diff_eq(moved.to_world(annotation.local_position), 1e-5));
        assert!(annotation.world_position.abs_diff_eq(Vec3::new(1.15, 0.1, 2.0), 1e-5));
    }

    #[test]
    fn test_free_drag_snaps_to_nearby_plane_when_enabled() {
        let engine = DragEngine::new(DragPolicy {
            snap_to_planes: true,
            ..Default::default()
        });
        let mut binder = AnnotationBinder::default();
        let (mut state, id) = placed_state(Vec3::new(0.0, 0.72, 0.0));
        let planes = [SurfacePlane::horizontal(0.0), SurfacePlane::horizontal(0.75)];

        engine.update_free_drag(&mut state, &mut binder, id, Vec3::X, &planes);
        assert!(position(&state).abs_diff_eq(Vec3::new(1.0, 0.75, 0.0), 1e-6));
    }
}
