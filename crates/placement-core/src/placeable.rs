//! Placeable objects and placed instances

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::types::{InstanceId, SceneNodeId, Transform, WorldAnchorId};

/// Collision group membership as a bit mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionGroup(pub u32);

impl CollisionGroup {
    pub const HORIZONTAL_PLANES: Self = Self(1 << 0);
    pub const VERTICAL_PLANES: Self = Self(1 << 1);
    pub const ALL_PLANES: Self = Self(Self::HORIZONTAL_PLANES.0 | Self::VERTICAL_PLANES.0);
    pub const PLACED_OBJECTS: Self = Self(1 << 2);
    pub const PREVIEW: Self = Self(1 << 3);

    /// Check whether any bit of `other` is set in this mask
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

/// Descriptor of a model that can be placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Stable file name, used as identity across the system
    pub file_name: String,
    pub display_name: String,
}

impl ModelDescriptor {
    pub fn new(file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        Self {
            display_name: file_name.clone(),
            file_name,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }
}

/// A selectable object that has not been placed yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placeable {
    pub descriptor: ModelDescriptor,
    /// Bounding box size of the model at unit scale
    pub extents: Vec3,
}

impl Placeable {
    pub fn new(descriptor: ModelDescriptor, extents: Vec3) -> Self {
        Self {
            descriptor,
            extents,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.descriptor.file_name
    }
}

/// A materialized object in the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedInstance {
    pub id: InstanceId,
    /// Scene node that represents this instance in the host scene graph
    pub node: SceneNodeId,
    /// Stable file/type name of the source placeable
    pub file_name: String,
    pub transform: Transform,
    pub extents: Vec3,
    pub collision_group: CollisionGroup,
    pub is_being_dragged: bool,
    /// Persisted world anchor this instance is attached to, if any
    pub world_anchor: Option<WorldAnchorId>,
}

impl PlacedInstance {
    pub fn new(file_name: impl Into<String>, extents: Vec3) -> Self {
        Self {
            id: InstanceId::new(),
            node: SceneNodeId::new(),
            file_name: file_name.into(),
            transform: Transform::IDENTITY,
            extents,
            collision_group: CollisionGroup::PLACED_OBJECTS,
            is_being_dragged: false,
            world_anchor: None,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }

    /// Convert a world-space point into this instance's local frame
    pub fn to_local(&self, world: Vec3) -> Vec3 {
        self.transform.inverse_transform_point(world)
    }

    /// Convert a local-frame point into world space
    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.transform.transform_point(local)
    }

    /// Offsets of the UI attached to this instance while it is highlighted
    pub fn highlight_ui(&self) -> HighlightUi {
        let extents = self.extents;
        let scale = self.transform.scale;
        HighlightUi {
            delete_button: Vec3::new(-extents.x / 2.0, extents.y / 2.0 + 0.02, 0.0),
            drag_tooltip: Vec3::new(0.0, -extents.y / 2.0 + 0.04, extents.z / 2.0 + 0.04),
            counter_scale: Vec3::ONE / scale.max(Vec3::splat(f32::EPSILON)),
        }
    }
}

/// Local offsets of the delete button and drag tooltip on a highlighted instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightUi {
    /// Top-left corner of the bounding box
    pub delete_button: Vec3,
    /// Front-bottom center of the bounding box
    pub drag_tooltip: Vec3,
    /// Scale that cancels the instance scale so UI keeps its size
    pub counter_scale: Vec3,
}
