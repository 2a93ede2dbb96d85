//! Read-only view of the engine state published to observers

use glam::{Mat4, Vec3};
use placement_core::{
    Annotation, AnnotationId, HighlightUi, IndicatorChild, InspectionMarker, InstanceId,
    InteractionMode, PlacedInstance, PlacementPhase, PreviewAnnotation, ViewMode,
};
use serde::{Deserialize, Serialize};

use crate::manager::PlacementManager;

/// Everything a presentation layer needs to render one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub phase: PlacementPhase,
    pub selected: Option<String>,
    pub placed: Option<PlacedInstance>,
    pub highlighted: Option<InstanceId>,
    /// Positions of the highlight affordances around the highlighted instance
    pub highlight_ui: Option<HighlightUi>,
    pub drag_in_progress: bool,
    pub active_collisions: u32,

    pub should_show_preview: bool,
    pub should_show_placement_ui: bool,
    pub is_placement_possible: bool,
    pub device_anchor_present: bool,
    pub plane_anchors_present: bool,
    pub plane_to_project_on_found: bool,
    pub user_placed_an_object: bool,
    pub user_dragged_an_object: bool,
    pub tracking_fix_present: bool,
    pub placed_has_reference_object: bool,

    pub placement_pose: Mat4,
    pub indicators: Vec<IndicatorChild>,
    pub preview_visible: bool,

    pub interaction_mode: Option<InteractionMode>,
    pub view_mode: ViewMode,

    pub annotations: Vec<Annotation>,
    pub focused_annotation: Option<AnnotationId>,
    pub annotations_visible: bool,
    pub preview_annotation: Option<PreviewAnnotation>,
    pub last_hit: Option<Vec3>,

    pub inspection_markers: Vec<InspectionMarker>,
}

impl SceneSnapshot {
    pub fn capture(manager: &PlacementManager) -> Self {
        let state = manager.state();
        let location = manager.location();
        let annotations = manager.annotations();

        Self {
            phase: state.phase(),
            selected: state
                .selected_object
                .as_ref()
                .map(|s| s.file_name().to_string()),
            placed: state.placed_object.clone(),
            highlighted: state.highlighted_id(),
            highlight_ui: state.highlighted_instance().map(PlacedInstance::highlight_ui),
            drag_in_progress: state.drag_in_progress(),
            active_collisions: state.active_collisions(),

            should_show_preview: state.should_show_preview(),
            should_show_placement_ui: state.should_show_placement_ui(),
            is_placement_possible: state.is_placement_possible(),
            device_anchor_present: state.device_anchor_present,
            plane_anchors_present: state.plane_anchors_present,
            plane_to_project_on_found: state.plane_to_project_on_found,
            user_placed_an_object: state.user_placed_an_object,
            user_dragged_an_object: state.user_dragged_an_object,
            tracking_fix_present: state.tracking_fix.present,
            placed_has_reference_object: state.placed_has_reference_object,

            placement_pose: location.transform,
            indicators: location.children.clone(),
            preview_visible: location.preview_visible,

            interaction_mode: manager.interaction_mode(),
            view_mode: manager.view_mode(),

            annotations: annotations.annotations().to_vec(),
            focused_annotation: annotations.focused_id(),
            annotations_visible: annotations.is_visible(),
            preview_annotation: annotations.preview().cloned(),
            last_hit: manager.last_hit(),

            inspection_markers: manager.inspection_markers().to_vec(),
        }
    }

    /// Title of the focused annotation, if any
    pub fn focused_title(&self) -> Option<&str> {
        let id = self.focused_annotation?;
        self.annotations
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.title.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{PlaneAnchor, PlaneAnchorUpdate, PlaneRegistry};
    use crate::config::EngineConfig;
    use crate::manager::Collaborators;
    use crate::memory::{
        MemoryMaterializer, MemoryPersistence, MemoryPlaneRegistry, MemoryScene, SimulatedDevice,
    };
    use glam::Vec2;
    use placement_core::{AnchorEvent, ModelDescriptor, Placeable};
    use std::sync::Arc;

    fn manager() -> PlacementManager {
        let planes = Arc::new(MemoryPlaneRegistry::new());
        planes.reconcile(&PlaneAnchorUpdate {
            event: AnchorEvent::Added,
            anchor: PlaneAnchor::horizontal(Mat4::IDENTITY, Vec2::splat(10.0)),
        });
        let device = Arc::new(SimulatedDevice::new());
        device.set_pose(Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0)));

        let collaborators = Collaborators {
            persistence: Arc::new(MemoryPersistence::new()),
            planes: planes.clone(),
            materializer: Arc::new(MemoryMaterializer::new()),
            device,
            scene: Arc::new(MemoryScene::new(planes)),
        };
        let mut manager = PlacementManager::new(&EngineConfig::new(), collaborators);
        manager.register_placeable(Placeable::new(ModelDescriptor::new("pump"), Vec3::splat(0.3)));
        manager
    }

    #[test]
    fn test_capture_reflects_preview_state() {
        let mut manager = manager();
        let idle = manager.snapshot();
        assert_eq!(idle.phase, PlacementPhase::Idle);
        assert!(idle.selected.is_none());
        assert!(idle.annotations_visible);

        manager.select_by_file_name("pump").unwrap();
        manager.device_tick();
        let previewing = manager.snapshot();
        assert_eq!(previewing.phase, PlacementPhase::Previewing);
        assert_eq!(previewing.selected.as_deref(), Some("pump"));
        assert!(previewing.is_placement_possible);
        assert!(previewing.preview_visible);
        assert_eq!(previewing.placement_pose, manager.location().transform);
        assert!(previewing.indicators.iter().any(|c| c.enabled && c.name == "placement_indicator"));
        assert_ne!(idle, previewing);
    }

    #[test]
    fn test_focused_title() {
        let mut manager = manager();
        manager.select_by_file_name("pump").unwrap();
        manager.device_tick();
        let placed = manager.place_selected_object().unwrap().unwrap();
        assert!(manager.snapshot().focused_title().is_none());

        let mut snapshot = manager.snapshot();
        snapshot.annotations.push(Annotation {
            id: AnnotationId::new(),
            host: placed.id,
            title: "Gasket".to_string(),
            description: String::new(),
            yes_no_answer: None,
            world_position: Vec3::ZERO,
            local_position: Vec3::ZERO,
            is_expanded: false,
            anchor: placement_core::AnnotationAnchor {
                position: Vec3::ZERO,
                holder_offset: Vec3::ZERO,
            },
        });
        snapshot.focused_annotation = Some(snapshot.annotations[0].id);
        assert_eq!(snapshot.focused_title(), Some("Gasket"));
    }
}
