//! In-memory collaborators
//!
//! Reference implementations of the collaborator traits, used by the
//! simulation binary and the tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use glam::{Mat4, Vec3};
use parking_lot::RwLock;
use placement_core::{
    AnchorEvent, CollisionGroup, InstanceId, Placeable, PlacedInstance, PlacementError, Ray,
    RaycastHit, SceneNodeId, SceneRaycaster, Transform, WorldAnchorId, ray_aabb_intersection,
    ray_plane_intersection,
};

use crate::collaborators::{
    AssetMaterializer, DeviceAnchor, DeviceTracker, Persistence, PlaneAnchor, PlaneAnchorUpdate,
    PlaneRegistry, SceneGraph, WorldAnchorUpdate,
};
use crate::error::PersistenceError;

/// Distance an anchored instance may drift from its anchor before it counts as moved
const MOVED_THRESHOLD: f32 = 1e-3;

// ============== Persistence ==============

#[derive(Debug, Default)]
struct PersistenceInner {
    anchors: HashMap<WorldAnchorId, Mat4>,
    bindings: HashMap<InstanceId, WorldAnchorId>,
    nodes: HashMap<SceneNodeId, InstanceId>,
}

/// World-anchor store kept in memory
#[derive(Debug)]
pub struct MemoryPersistence {
    inner: RwLock<PersistenceInner>,
    available: AtomicBool,
}

impl Default for MemoryPersistence {
    fn default() -> Self {
        Self {
            inner: RwLock::new(PersistenceInner::default()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `attach` fail while unavailable
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn anchor_for(&self, instance: InstanceId) -> Option<WorldAnchorId> {
        self.inner.read().bindings.get(&instance).copied()
    }

    pub fn anchor_count(&self) -> usize {
        self.inner.read().anchors.len()
    }

    fn new_anchor(inner: &mut PersistenceInner, instance: &PlacedInstance) -> WorldAnchorId {
        let id = WorldAnchorId::new();
        inner.anchors.insert(id, instance.transform.to_mat4());
        inner.bindings.insert(instance.id, id);
        inner.nodes.insert(instance.node, instance.id);
        id
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    fn track(&self, instance: &PlacedInstance) {
        self.inner.write().nodes.insert(instance.node, instance.id);
    }

    async fn attach(&self, instance: &PlacedInstance) -> Result<WorldAnchorId, PersistenceError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "world tracking is not running".to_string(),
            ));
        }
        let mut inner = self.inner.write();
        if let Some(previous) = inner.bindings.remove(&instance.id) {
            inner.anchors.remove(&previous);
        }
        let id = Self::new_anchor(&mut inner, instance);
        tracing::debug!("Attached {} to world anchor {}", instance.file_name, id);
        Ok(id)
    }

    async fn detach_moved_objects(&self, instances: &[PlacedInstance]) -> Vec<InstanceId> {
        let mut inner = self.inner.write();
        let mut detached = Vec::new();

        for instance in instances {
            let Some(anchor_id) = inner.bindings.get(&instance.id).copied() else {
                continue;
            };
            let anchor_position = inner
                .anchors
                .get(&anchor_id)
                .map(|m| m.w_axis.truncate());
            let moved = instance.is_being_dragged
                || anchor_position
                    .is_none_or(|p| p.distance(instance.position()) > MOVED_THRESHOLD);

            if moved {
                inner.bindings.remove(&instance.id);
                inner.anchors.remove(&anchor_id);
                detached.push(instance.id);
            }
        }
        detached
    }

    async fn reattach_resting_objects(
        &self,
        instances: &[PlacedInstance],
    ) -> Vec<(InstanceId, WorldAnchorId)> {
        if !self.available.load(Ordering::SeqCst) {
            return Vec::new();
        }
        let mut inner = self.inner.write();
        let resting: Vec<&PlacedInstance> = instances
            .iter()
            .filter(|i| !i.is_being_dragged && !inner.bindings.contains_key(&i.id))
            .collect();
        resting
            .into_iter()
            .map(|instance| (instance.id, Self::new_anchor(&mut inner, instance)))
            .collect()
    }

    fn reconcile(&self, update: &WorldAnchorUpdate) {
        let mut inner = self.inner.write();
        match update.event {
            AnchorEvent::Added | AnchorEvent::Updated => {
                inner.anchors.insert(update.anchor.id, update.anchor.transform);
            }
            AnchorEvent::Removed => {
                inner.anchors.remove(&update.anchor.id);
                inner.bindings.retain(|_, anchor| *anchor != update.anchor.id);
            }
        }
    }

    fn remove(&self, instance: InstanceId) {
        let mut inner = self.inner.write();
        if let Some(anchor) = inner.bindings.remove(&instance) {
            inner.anchors.remove(&anchor);
        }
        inner.nodes.retain(|_, id| *id != instance);
    }

    fn remove_all(&self) {
        let mut inner = self.inner.write();
        inner.anchors.clear();
        inner.bindings.clear();
        inner.nodes.clear();
    }

    fn lookup(&self, node: SceneNodeId) -> Option<InstanceId> {
        self.inner.read().nodes.get(&node).copied()
    }
}

// ============== Planes ==============

/// Plane registry keyed by plane id
#[derive(Debug, Default)]
pub struct MemoryPlaneRegistry {
    planes: RwLock<HashMap<placement_core::PlaneId, PlaneAnchor>>,
}

impl MemoryPlaneRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaneRegistry for MemoryPlaneRegistry {
    fn reconcile(&self, update: &PlaneAnchorUpdate) {
        let mut planes = self.planes.write();
        match update.event {
            AnchorEvent::Added | AnchorEvent::Updated => {
                planes.insert(update.anchor.id, update.anchor);
            }
            AnchorEvent::Removed => {
                planes.remove(&update.anchor.id);
            }
        }
    }

    fn planes(&self) -> Vec<PlaneAnchor> {
        self.planes.read().values().copied().collect()
    }
}

// ============== Materializer ==============

/// Materializes any placeable except those marked as broken
#[derive(Debug, Default)]
pub struct MemoryMaterializer {
    broken: RwLock<HashSet<String>>,
}

impl MemoryMaterializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make materialization of `file_name` fail
    pub fn mark_broken(&self, file_name: impl Into<String>) {
        self.broken.write().insert(file_name.into());
    }
}

impl AssetMaterializer for MemoryMaterializer {
    fn materialize(&self, placeable: &Placeable) -> Result<PlacedInstance, PlacementError> {
        if self.broken.read().contains(placeable.file_name()) {
            return Err(PlacementError::Materialization {
                file_name: placeable.file_name().to_string(),
                reason: "asset could not be loaded".to_string(),
            });
        }
        Ok(PlacedInstance::new(placeable.file_name(), placeable.extents))
    }
}

// ============== Device ==============

/// Device tracker driven by explicit pose updates
#[derive(Debug)]
pub struct SimulatedDevice {
    running: AtomicBool,
    anchor: RwLock<Option<DeviceAnchor>>,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(true),
            anchor: RwLock::new(None),
        }
    }
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pose(&self, transform: Mat4) {
        *self.anchor.write() = Some(DeviceAnchor {
            transform,
            is_tracked: true,
        });
    }

    pub fn lose_tracking(&self) {
        if let Some(anchor) = self.anchor.write().as_mut() {
            anchor.is_tracked = false;
        }
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

impl DeviceTracker for SimulatedDevice {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn device_anchor(&self) -> Option<DeviceAnchor> {
        *self.anchor.read()
    }
}

// ============== Scene ==============

#[derive(Debug, Clone, Copy)]
struct ObjectCollider {
    transform: Transform,
    extents: Vec3,
}

/// Scene graph with plane colliders from a registry and box colliders for instances
pub struct MemoryScene<P: PlaneRegistry> {
    planes: std::sync::Arc<P>,
    plane_nodes: RwLock<HashMap<placement_core::PlaneId, SceneNodeId>>,
    objects: RwLock<HashMap<SceneNodeId, ObjectCollider>>,
}

impl<P: PlaneRegistry> MemoryScene<P> {
    pub fn new(planes: std::sync::Arc<P>) -> Self {
        Self {
            planes,
            plane_nodes: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
        }
    }

    fn plane_node(&self, plane: &PlaneAnchor) -> SceneNodeId {
        if let Some(node) = self.plane_nodes.read().get(&plane.id) {
            return *node;
        }
        *self.plane_nodes.write().entry(plane.id).or_default()
    }

    fn raycast_planes(&self, ray: &Ray, max_distance: f32, mask: CollisionGroup) -> Option<RaycastHit> {
        self.planes
            .planes()
            .iter()
            .filter(|plane| mask.intersects(plane.collision_group()))
            .filter_map(|plane| {
                let surface = plane.surface();
                let t = ray_plane_intersection(ray, surface.point, surface.normal)?;
                let position = ray.at(t);
                (t <= max_distance && plane.contains(position)).then(|| RaycastHit {
                    node: self.plane_node(plane),
                    position,
                    distance: t,
                    group: plane.collision_group(),
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn raycast_objects(&self, ray: &Ray, max_distance: f32) -> Option<RaycastHit> {
        self.objects
            .read()
            .iter()
            .filter_map(|(node, collider)| {
                let to_local = collider.transform.to_mat4().inverse();
                let local_origin = to_local.transform_point3(ray.origin);
                let local_direction = to_local.transform_vector3(ray.direction);
                let local_ray = Ray::new(local_origin, local_direction);

                let half = collider.extents / 2.0;
                let t = ray_aabb_intersection(&local_ray, -half, half)?;
                let position = collider.transform.transform_point(local_ray.at(t));
                let distance = position.distance(ray.origin);

                (distance <= max_distance).then_some(RaycastHit {
                    node: *node,
                    position,
                    distance,
                    group: CollisionGroup::PLACED_OBJECTS,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

impl<P: PlaneRegistry> SceneRaycaster for MemoryScene<P> {
    fn raycast(&self, ray: &Ray, max_distance: f32, mask: CollisionGroup) -> Option<RaycastHit> {
        let plane_hit = if mask.intersects(CollisionGroup::ALL_PLANES) {
            self.raycast_planes(ray, max_distance, mask)
        } else {
            None
        };
        let object_hit = if mask.intersects(CollisionGroup::PLACED_OBJECTS) {
            self.raycast_objects(ray, max_distance)
        } else {
            None
        };

        match (plane_hit, object_hit) {
            (Some(a), Some(b)) => Some(if a.distance <= b.distance { a } else { b }),
            (a, b) => a.or(b),
        }
    }
}

impl<P: PlaneRegistry> SceneGraph for MemoryScene<P> {
    fn sync_instance(&self, instance: &PlacedInstance) {
        self.objects.write().insert(
            instance.node,
            ObjectCollider {
                transform: instance.transform,
                extents: instance.extents,
            },
        );
    }

    fn remove_node(&self, node: SceneNodeId) {
        self.objects.write().remove(&node);
    }
}
