//! Single-writer placement manager
//!
//! Owns the placement state, annotations, inspection data and the placement
//! location. Every mutating call runs to completion synchronously; the
//! [`crate::Engine`] serializes access through [`SharedManager`].

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use parking_lot::Mutex;
use placement_core::{
    AnnotationBinder, AnnotationId, AnnotationQuery, DragEngine, FusionOutcome, InspectionCatalog,
    InspectionKind, InspectionMarker, InspectionResult, InspectionResults, InspectionUpdate,
    InstanceId, InteractionMode, ModelDescriptor, Placeable, PlacedInstance, PlacementError,
    PlacementLocation, PlacementResolver, PlacementResult, PlacementState, ReferenceAnchorUpdate,
    SurfacePlane, ViewMode, WorldAnchorId, fuse_reference_update, snap_to_tracking_fix,
};

use crate::collaborators::{
    AssetMaterializer, DeviceTracker, Persistence, PlaneAlignment, PlaneAnchorUpdate,
    PlaneRegistry, SceneGraph, WorldAnchorUpdate,
};
use crate::config::EngineConfig;
use crate::snapshot::SceneSnapshot;

/// Shared manager type
pub type SharedManager = Arc<Mutex<PlacementManager>>;

/// Default texts of the preview annotation re-aimed while adding annotations
pub const DEFAULT_PREVIEW_TITLE: &str = "Checkpoint";
pub const DEFAULT_PREVIEW_DESCRIPTION: &str = "Possible issue area.";

/// Collaborators consumed by the manager
#[derive(Clone)]
pub struct Collaborators {
    pub persistence: Arc<dyn Persistence>,
    pub planes: Arc<dyn PlaneRegistry>,
    pub materializer: Arc<dyn AssetMaterializer>,
    pub device: Arc<dyn DeviceTracker>,
    pub scene: Arc<dyn SceneGraph>,
}

pub struct PlacementManager {
    state: PlacementState,
    location: PlacementLocation,
    resolver: PlacementResolver,
    drag: DragEngine,
    annotations: AnnotationBinder,
    placeables: BTreeMap<String, Placeable>,
    inspection: InspectionCatalog,
    inspection_markers: Vec<InspectionMarker>,
    inspection_results: InspectionResults,
    interaction_mode: Option<InteractionMode>,
    view_mode: ViewMode,
    last_hit: Option<Vec3>,
    collaborators: Collaborators,
}

impl PlacementManager {
    pub fn new(config: &EngineConfig, collaborators: Collaborators) -> Self {
        Self {
            state: PlacementState::new(),
            location: PlacementLocation::new().with_indicator("placement_indicator"),
            resolver: PlacementResolver::new(config.placement),
            drag: DragEngine::new(config.drag),
            annotations: AnnotationBinder::new(config.annotation),
            placeables: BTreeMap::new(),
            inspection: InspectionCatalog::new(),
            inspection_markers: Vec::new(),
            inspection_results: InspectionResults::new(),
            interaction_mode: None,
            view_mode: ViewMode::default(),
            last_hit: None,
            collaborators,
        }
    }

    /// Wrap into the shared, exclusively locked form
    pub fn into_shared(self) -> SharedManager {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> &PlacementState {
        &self.state
    }

    pub fn location(&self) -> &PlacementLocation {
        &self.location
    }

    pub fn annotations(&self) -> &AnnotationBinder {
        &self.annotations
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    // ============== Catalogue and selection ==============

    pub fn register_placeable(&mut self, placeable: Placeable) {
        tracing::debug!("Registered placeable {}", placeable.file_name());
        self.placeables
            .insert(placeable.file_name().to_string(), placeable);
    }

    /// Descriptors of all placeables, sorted by display name
    pub fn model_descriptors(&self) -> Vec<ModelDescriptor> {
        let mut descriptors: Vec<ModelDescriptor> = self
            .placeables
            .values()
            .map(|p| p.descriptor.clone())
            .collect();
        descriptors.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        descriptors
    }

    pub fn select(&mut self, placeable: Option<Placeable>) {
        let previous = self.state.select(placeable);
        if let Some(previous) = previous {
            tracing::debug!("Cleared preview of {}", previous.file_name());
        }
        let preview = self.state.selected_object.as_ref().map(|s| s.file_name().to_string());
        self.location.set_preview(preview);
    }

    /// Toggle the selection of a registered placeable
    pub fn select_by_file_name(&mut self, file_name: &str) -> PlacementResult<()> {
        let placeable = self
            .placeables
            .get(file_name)
            .cloned()
            .ok_or_else(|| PlacementError::UnknownPlaceable(file_name.to_string()))?;
        self.select(Some(placeable));
        Ok(())
    }

    // ============== Modes ==============

    pub fn interaction_mode(&self) -> Option<InteractionMode> {
        self.interaction_mode
    }

    pub fn set_interaction_mode(&mut self, mode: Option<InteractionMode>) {
        self.interaction_mode = mode;
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    /// Switch view mode; leaving AddAnnotation drops the preview annotation
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if self.view_mode == ViewMode::AddAnnotation && mode != ViewMode::AddAnnotation {
            self.annotations.clear_preview();
        }
        self.view_mode = mode;
    }

    // ============== Device tick ==============

    /// One device-pose sample: presence flags, highlight and placement location.
    ///
    /// Returns false if no tracked device pose was available.
    pub fn device_tick(&mut self) -> bool {
        let device = self.collaborators.device.clone();
        if !device.is_running() {
            return false;
        }

        let anchor = device.device_anchor();
        self.state.device_anchor_present = anchor.is_some();
        self.state.plane_anchors_present = !self.collaborators.planes.planes().is_empty();
        self.location.preview_visible =
            self.location.preview.is_some() && self.state.should_show_preview();

        let Some(anchor) = anchor.filter(|a| a.is_tracked) else {
            return false;
        };

        self.update_highlight(anchor.transform);
        let scene = self.collaborators.scene.clone();
        self.resolver
            .update(&mut self.state, &mut self.location, anchor.transform, scene.as_ref());
        true
    }

    fn update_highlight(&mut self, device_pose: Mat4) {
        let scene = self.collaborators.scene.clone();
        let hit = self.resolver.resolve_highlight(device_pose, scene.as_ref());

        let target = hit.and_then(|hit| {
            let id = self.collaborators.persistence.lookup(hit.node)?;
            self.state.instance(id).map(|_| (id, hit.position))
        });

        match target {
            Some((id, position)) => {
                if self.state.set_highlighted(Some(id)) {
                    tracing::debug!("Highlighted {}", id);
                }
                self.last_hit = Some(position);
                if self.view_mode == ViewMode::AddAnnotation {
                    self.show_annotation_preview(DEFAULT_PREVIEW_TITLE, DEFAULT_PREVIEW_DESCRIPTION);
                }
            }
            None => {
                self.state.set_highlighted(None);
                self.last_hit = None;
            }
        }
    }

    pub fn last_hit(&self) -> Option<Vec3> {
        self.last_hit
    }

    // ============== Placement ==============

    /// Materialize the selection at the current placement location.
    ///
    /// Returns the placed instance so the caller can attach it to a world
    /// anchor, or None if placement is not possible right now. A
    /// materialization failure leaves the state unchanged.
    pub fn place_selected_object(&mut self) -> PlacementResult<Option<PlacedInstance>> {
        if self.state.placed_object.is_some() {
            tracing::warn!("An object is already placed. Cannot place another.");
            return Ok(None);
        }
        let Some(placeable) = self.state.object_to_place().cloned() else {
            tracing::warn!("Placement is not possible right now");
            return Ok(None);
        };

        let mut instance = self.collaborators.materializer.materialize(&placeable)?;
        let (_, rotation, translation) = self.location.transform.to_scale_rotation_translation();
        instance.transform.translation = translation;
        instance.transform.rotation = rotation;

        self.collaborators.scene.sync_instance(&instance);
        self.collaborators.persistence.track(&instance);
        self.inspection_markers = self.inspection.markers_for(&instance);

        tracing::info!("Placed {} at {:?}", instance.file_name, translation);
        self.state.user_placed_an_object = true;
        self.state.placed_object = Some(instance.clone());
        Ok(Some(instance))
    }

    /// Record the world anchor an instance was attached to
    pub fn bind_world_anchor(&mut self, instance: InstanceId, anchor: WorldAnchorId) -> bool {
        let Some(placed) = self.state.instance_mut(instance) else {
            tracing::debug!("Instance {} was removed before its anchor was bound", instance);
            return false;
        };
        placed.world_anchor = Some(anchor);
        true
    }

    /// Copies of the placed instances, for the anchor maintenance loops
    pub fn placed_instances(&self) -> Vec<PlacedInstance> {
        self.state.placed_object.iter().cloned().collect()
    }

    pub fn apply_detached(&mut self, detached: &[InstanceId]) {
        for id in detached {
            if let Some(instance) = self.state.instance_mut(*id) {
                instance.world_anchor = None;
                tracing::debug!("Detached {} from its world anchor", instance.file_name);
            }
        }
    }

    pub fn apply_reattached(&mut self, bindings: &[(InstanceId, WorldAnchorId)]) {
        for (id, anchor) in bindings {
            self.bind_world_anchor(*id, *anchor);
        }
    }

    // ============== Removal ==============

    /// Remove the highlighted instance with its annotations, markers and anchor
    pub fn remove_highlighted_object(&mut self) -> Option<InstanceId> {
        let Some(id) = self.state.highlighted_id() else {
            tracing::warn!("No highlighted object to remove");
            return None;
        };
        self.collaborators.persistence.remove(id);
        self.state.set_highlighted(None);

        if self.state.instance(id).is_some() {
            self.teardown_placed();
        }
        Some(id)
    }

    pub fn remove_all_placed_objects(&mut self) {
        self.collaborators.persistence.remove_all();
        self.teardown_placed();
        self.annotations.clear();
        self.inspection_results.clear();
        self.state.set_highlighted(None);
        self.last_hit = None;
        tracing::info!("Removed all placed objects");
    }

    fn teardown_placed(&mut self) {
        let Some(removed) = self.state.clear_placed() else {
            return;
        };
        let annotations = self.annotations.remove_for_instance(removed.id);
        self.collaborators.scene.remove_node(removed.node);
        self.inspection_markers.clear();
        tracing::info!(
            "Removed {} and {} annotations",
            removed.file_name,
            annotations
        );
    }

    // ============== Collisions ==============

    pub fn collision_began(&mut self, file_name: &str) -> bool {
        self.state.collision_began(file_name)
    }

    pub fn collision_ended(&mut self, file_name: &str) -> bool {
        self.state.collision_ended(file_name)
    }

    // ============== Drag ==============

    fn horizontal_surfaces(&self) -> Vec<SurfacePlane> {
        self.collaborators
            .planes
            .planes()
            .iter()
            .filter(|p| p.alignment == PlaneAlignment::Horizontal)
            .map(|p| p.surface())
            .collect()
    }

    pub fn update_free_drag(&mut self, target: InstanceId, world_delta: Vec3) -> bool {
        let planes = if self.drag.policy().snap_to_planes {
            self.horizontal_surfaces()
        } else {
            Vec::new()
        };
        let moved = self.drag.update_free_drag(
            &mut self.state,
            &mut self.annotations,
            target,
            world_delta,
            &planes,
        );
        if moved {
            self.sync_placed();
        }
        moved
    }

    pub fn update_mode_drag(&mut self, world_delta: Vec3) -> bool {
        let moved = self.drag.update_mode_drag(
            &mut self.state,
            &mut self.annotations,
            self.interaction_mode,
            world_delta,
        );
        if moved {
            self.sync_placed();
        }
        moved
    }

    pub fn end_drag(&mut self) -> bool {
        self.drag.end_drag(&mut self.state)
    }

    fn sync_placed(&mut self) {
        if let Some(placed) = self.state.placed_object.as_ref() {
            self.collaborators.scene.sync_instance(placed);
            self.inspection_markers = self.inspection.markers_for(placed);
        }
    }

    // ============== Anchor streams ==============

    pub fn reconcile_world_anchor(&mut self, update: &WorldAnchorUpdate) {
        self.collaborators.persistence.reconcile(update);
    }

    pub fn reconcile_plane(&mut self, update: &PlaneAnchorUpdate) {
        self.collaborators.planes.reconcile(update);
    }

    pub fn process_reference_update(&mut self, update: &ReferenceAnchorUpdate) -> FusionOutcome {
        let outcome = fuse_reference_update(
            &mut self.state,
            &mut self.annotations,
            self.interaction_mode,
            update,
        );
        if matches!(outcome, FusionOutcome::FixUpdated { snapped: true }) {
            self.sync_placed();
        }
        outcome
    }

    /// Manually snap the placed instance to the cached tracking fix
    pub fn snap_to_tracked_pose(&mut self) -> bool {
        let snapped = snap_to_tracking_fix(&mut self.state, &mut self.annotations);
        if snapped {
            self.sync_placed();
        } else {
            tracing::warn!("No tracked pose to snap to");
        }
        snapped
    }

    // ============== Annotations ==============

    /// Create or re-aim the preview at the last hit on the highlighted instance
    pub fn show_annotation_preview(&mut self, title: &str, description: &str) -> bool {
        let (Some(host), Some(hit)) = (self.state.highlighted_instance(), self.last_hit) else {
            tracing::debug!("No highlighted object or hit point for the annotation preview");
            return false;
        };
        self.annotations.show_preview(host, hit, title, description);
        true
    }

    /// Commit the preview onto its host instance
    pub fn commit_annotation(&mut self) -> Option<AnnotationId> {
        let Some(host_id) = self.annotations.preview().map(|p| p.host) else {
            tracing::warn!("Cannot add annotation: no preview");
            return None;
        };
        let Some(host) = self.state.instance(host_id) else {
            tracing::warn!("Cannot add annotation: its object is no longer placed");
            self.annotations.clear_preview();
            return None;
        };
        self.annotations.commit(host)
    }

    pub fn remove_annotation(&mut self, id: AnnotationId) -> bool {
        self.annotations.remove(id).is_some()
    }

    pub fn remove_annotation_by_title(&mut self, title: &str) -> bool {
        self.annotations.remove_by_title(title).is_some()
    }

    pub fn remove_focused_annotation(&mut self) -> bool {
        self.annotations.remove_focused().is_some()
    }

    pub fn focus_annotation(&mut self, title: &str) -> bool {
        self.annotations.focus_by_title(title)
    }

    pub fn update_focused_annotation(
        &mut self,
        title: &str,
        description: &str,
        yes_no_answer: Option<bool>,
    ) -> bool {
        self.annotations
            .update_focused(title, description, yes_no_answer)
    }

    pub fn toggle_annotation_expanded(&mut self, title: &str) -> bool {
        self.annotations.toggle_expanded(title)
    }

    pub fn set_annotations_visible(&mut self, visible: bool) {
        self.annotations.set_visible(visible);
    }

    pub fn filter_annotation_titles(&self, query: &AnnotationQuery) -> Vec<String> {
        self.annotations
            .filter_titles(query)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    // ============== Inspection ==============

    pub fn set_inspection_catalog(&mut self, catalog: InspectionCatalog) {
        self.inspection = catalog;
        self.inspection_markers = match self.state.placed_object.as_ref() {
            Some(placed) => self.inspection.markers_for(placed),
            None => Vec::new(),
        };
    }

    pub fn inspection_markers(&self) -> &[InspectionMarker] {
        &self.inspection_markers
    }

    /// Record a result for one inspection point of the placed instance
    pub fn record_inspection_result(
        &mut self,
        kind: InspectionKind,
        update: InspectionUpdate,
    ) -> Option<InspectionResult> {
        let Some(placed) = self.state.placed_object.as_ref() else {
            tracing::warn!("No placed object to record an inspection result for");
            return None;
        };
        let name = self
            .inspection
            .points_for(&placed.file_name)
            .and_then(|points| points.get(&kind))
            .map(|p| p.name.clone())
            .unwrap_or_else(|| kind.as_str().to_string());

        Some(
            self.inspection_results
                .record(&placed.file_name, kind, &name, update)
                .clone(),
        )
    }

    pub fn inspection_results(&self) -> &InspectionResults {
        &self.inspection_results
    }

    // ============== Snapshots ==============

    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot::capture(self)
    }
}
