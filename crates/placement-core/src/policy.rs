//! Tunable policy values

use serde::{Deserialize, Serialize};

/// Raycast and fallback values used to resolve the placement pose
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlacementPolicy {
    /// Hits closer than this (meters) are ignored
    pub min_distance: f32,
    /// Maximum raycast length (meters)
    pub max_distance: f32,
    /// Gap between a plane and an object placed on it
    pub plane_offset: f32,
    /// Downward tilt of the placement ray
    pub raycast_tilt_degrees: f32,
    /// Forward distance of the fallback pose when no plane is hit
    pub fallback_distance: f32,
    /// Vertical offset of the fallback pose
    pub fallback_vertical_offset: f32,
    /// Raycast length used to find the object the device points at
    pub highlight_max_distance: f32,
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self {
            min_distance: 0.2,
            max_distance: 3.0,
            plane_offset: 0.01,
            raycast_tilt_degrees: 15.0,
            fallback_distance: 0.7,
            fallback_vertical_offset: 0.07,
            highlight_max_distance: 100.0,
        }
    }
}

/// Drag gesture tuning
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DragPolicy {
    /// Yaw increment (radians) applied per rotation-mode update
    pub rotation_speed: f32,
    /// Snap free-plane drags onto a nearby horizontal plane
    pub snap_to_planes: bool,
    /// Maximum vertical distance for plane snapping
    pub snap_to_plane_distance: f32,
}

impl Default for DragPolicy {
    fn default() -> Self {
        Self {
            rotation_speed: 0.006,
            snap_to_planes: false,
            snap_to_plane_distance: 0.04,
        }
    }
}

/// Annotation placement tuning
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnnotationPolicy {
    /// Outward push from the hit surface
    pub surface_offset: f32,
    /// Replace committed titles with unique random numbers (demo mode)
    pub numbered_titles: bool,
    /// Upper bound of the numbered title range
    pub max_numbered_titles: u32,
}

impl Default for AnnotationPolicy {
    fn default() -> Self {
        Self {
            surface_offset: 0.05,
            numbered_titles: false,
            max_numbered_titles: 100,
        }
    }
}
