//! Contracts of the external collaborators the engine drives
//!
//! The engine owns placement state; persistence, plane bookkeeping, asset
//! loading, device tracking and the scene graph are consumed through these
//! narrow traits.

use async_trait::async_trait;
use glam::{Mat4, Vec2, Vec3};
use placement_core::{
    AnchorEvent, CollisionGroup, InstanceId, Placeable, PlacedInstance, PlacementError, PlaneId,
    SceneNodeId, SceneRaycaster, SurfacePlane, WorldAnchorId,
};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

/// Latest device pose reported by world tracking
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceAnchor {
    pub transform: Mat4,
    pub is_tracked: bool,
}

/// A persisted world anchor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldAnchor {
    pub id: WorldAnchorId,
    pub transform: Mat4,
    pub is_tracked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldAnchorUpdate {
    pub event: AnchorEvent,
    pub anchor: WorldAnchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaneAlignment {
    Horizontal,
    Vertical,
}

/// A detected plane; its local Y axis is the plane normal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneAnchor {
    pub id: PlaneId,
    pub transform: Mat4,
    /// Width (local X) and depth (local Z)
    pub extent: Vec2,
    pub alignment: PlaneAlignment,
}

impl PlaneAnchor {
    pub fn horizontal(transform: Mat4, extent: Vec2) -> Self {
        Self {
            id: PlaneId::new(),
            transform,
            extent,
            alignment: PlaneAlignment::Horizontal,
        }
    }

    pub fn vertical(transform: Mat4, extent: Vec2) -> Self {
        Self {
            id: PlaneId::new(),
            transform,
            extent,
            alignment: PlaneAlignment::Vertical,
        }
    }

    pub fn collision_group(&self) -> CollisionGroup {
        match self.alignment {
            PlaneAlignment::Horizontal => CollisionGroup::HORIZONTAL_PLANES,
            PlaneAlignment::Vertical => CollisionGroup::VERTICAL_PLANES,
        }
    }

    pub fn surface(&self) -> SurfacePlane {
        SurfacePlane::new(
            self.transform.w_axis.truncate(),
            self.transform.y_axis.truncate(),
        )
    }

    /// Whether a point on the plane lies within its extent
    pub fn contains(&self, point: Vec3) -> bool {
        let local = self.transform.inverse().transform_point3(point);
        local.x.abs() <= self.extent.x / 2.0 && local.z.abs() <= self.extent.y / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneAnchorUpdate {
    pub event: AnchorEvent,
    pub anchor: PlaneAnchor,
}

/// World-anchor persistence
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Make `instance` discoverable through [`Persistence::lookup`]
    fn track(&self, instance: &PlacedInstance);

    /// Attach `instance` to a new world anchor
    async fn attach(&self, instance: &PlacedInstance) -> Result<WorldAnchorId, PersistenceError>;

    /// Detach instances that moved away from their anchor; returns the detached ids
    async fn detach_moved_objects(&self, instances: &[PlacedInstance]) -> Vec<InstanceId>;

    /// Anchor instances that are at rest without an anchor; returns the new bindings
    async fn reattach_resting_objects(
        &self,
        instances: &[PlacedInstance],
    ) -> Vec<(InstanceId, WorldAnchorId)>;

    fn reconcile(&self, update: &WorldAnchorUpdate);

    fn remove(&self, instance: InstanceId);

    fn remove_all(&self);

    fn lookup(&self, node: SceneNodeId) -> Option<InstanceId>;
}

/// Plane anchor bookkeeping
pub trait PlaneRegistry: Send + Sync {
    fn reconcile(&self, update: &PlaneAnchorUpdate);

    fn planes(&self) -> Vec<PlaneAnchor>;
}

/// Turns a selection into a scene instance
pub trait AssetMaterializer: Send + Sync {
    fn materialize(&self, placeable: &Placeable) -> Result<PlacedInstance, PlacementError>;
}

/// World tracking provider
pub trait DeviceTracker: Send + Sync {
    fn is_running(&self) -> bool;

    fn device_anchor(&self) -> Option<DeviceAnchor>;
}

/// Host scene graph: raycasts plus the colliders of placed instances
pub trait SceneGraph: SceneRaycaster {
    /// Insert or move the collider of an instance
    fn sync_instance(&self, instance: &PlacedInstance);

    fn remove_node(&self, node: SceneNodeId);
}
