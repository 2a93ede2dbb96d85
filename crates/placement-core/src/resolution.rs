//! Placement pose resolution by raycasting against detected planes

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::geometry::{Ray, gravity_aligned, placement_ray, with_translation};
use crate::placeable::CollisionGroup;
use crate::policy::PlacementPolicy;
use crate::state::PlacementState;
use crate::types::SceneNodeId;

/// Name of the placement-location child that is never toggled
pub const TOOLTIP_CHILD: &str = "tooltip";

/// Nearest-hit raycast query against the host scene graph
pub trait SceneRaycaster: Send + Sync {
    /// Return the nearest hit within `max_distance` on any collider whose
    /// group intersects `mask`.
    fn raycast(&self, ray: &Ray, max_distance: f32, mask: CollisionGroup) -> Option<RaycastHit>;
}

/// A single raycast hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub node: SceneNodeId,
    pub position: Vec3,
    pub distance: f32,
    /// Collision group of the collider that was hit
    pub group: CollisionGroup,
}

/// Result of one resolution tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub pose: Mat4,
    pub plane_found: bool,
}

/// Child entity of the placement location (indicator, tooltip)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorChild {
    pub name: String,
    pub enabled: bool,
}

/// Where the selection would be placed, with its indicator children
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementLocation {
    pub transform: Mat4,
    pub children: Vec<IndicatorChild>,
    /// File name of the selection previewed at this location
    pub preview: Option<String>,
    pub preview_visible: bool,
}

impl Default for PlacementLocation {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            children: vec![IndicatorChild {
                name: TOOLTIP_CHILD.to_string(),
                enabled: true,
            }],
            preview: None,
            preview_visible: false,
        }
    }
}

impl PlacementLocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indicator(mut self, name: impl Into<String>) -> Self {
        self.children.push(IndicatorChild {
            name: name.into(),
            enabled: false,
        });
        self
    }

    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }

    pub fn child(&self, name: &str) -> Option<&IndicatorChild> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn set_preview(&mut self, file_name: Option<String>) {
        self.preview = file_name;
        if self.preview.is_none() {
            self.preview_visible = false;
        }
    }

    /// Toggle the secondary indicators.
    ///
    /// Indicators are enabled only while a plane is found and nothing is
    /// placed. Does nothing unless at least one child besides the tooltip exists.
    pub fn apply_indicator_toggle(&mut self, plane_found: bool, object_placed: bool) {
        if self.children.len() <= 1 {
            return;
        }
        let enabled = plane_found && !object_placed;
        for child in self.children.iter_mut().filter(|c| c.name != TOOLTIP_CHILD) {
            child.enabled = enabled;
        }
    }
}

/// Resolves the placement pose from the device pose each tick
#[derive(Debug, Clone, Default)]
pub struct PlacementResolver {
    policy: PlacementPolicy,
}

impl PlacementResolver {
    pub fn new(policy: PlacementPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PlacementPolicy {
        &self.policy
    }

    pub fn ray(&self, device_pose: Mat4) -> Ray {
        placement_ray(device_pose, self.policy.raycast_tilt_degrees)
    }

    /// Resolve the placement pose for a device pose.
    ///
    /// A hit on a non-vertical plane farther than the minimum distance yields
    /// the gravity-aligned device pose moved onto the hit (plus the plane
    /// offset). Anything else yields the fixed fallback in front of the device.
    pub fn resolve<S: SceneRaycaster + ?Sized>(&self, device_pose: Mat4, scene: &S) -> Resolution {
        let upright = gravity_aligned(device_pose);
        let ray = self.ray(device_pose);

        let hit = scene
            .raycast(&ray, self.policy.max_distance, CollisionGroup::ALL_PLANES)
            .filter(|hit| hit.distance > self.policy.min_distance)
            .filter(|hit| hit.group != CollisionGroup::VERTICAL_PLANES);

        match hit {
            Some(hit) => Resolution {
                pose: with_translation(
                    upright,
                    hit.position + Vec3::Y * self.policy.plane_offset,
                ),
                plane_found: true,
            },
            None => {
                let offset = Mat4::from_translation(Vec3::new(
                    0.0,
                    self.policy.fallback_vertical_offset,
                    -self.policy.fallback_distance,
                ));
                Resolution {
                    pose: upright * offset,
                    plane_found: false,
                }
            }
        }
    }

    /// Resolve and write the result into the state and placement location
    pub fn update<S: SceneRaycaster + ?Sized>(
        &self,
        state: &mut PlacementState,
        location: &mut PlacementLocation,
        device_pose: Mat4,
        scene: &S,
    ) -> Resolution {
        let resolution = self.resolve(device_pose, scene);

        location.transform = resolution.pose;
        state.plane_to_project_on_found = resolution.plane_found;
        location.apply_indicator_toggle(resolution.plane_found, state.placed_object.is_some());

        resolution
    }

    /// Find the placed object the device points at
    pub fn resolve_highlight<S: SceneRaycaster + ?Sized>(
        &self,
        device_pose: Mat4,
        scene: &S,
    ) -> Option<RaycastHit> {
        let ray = self.ray(device_pose);
        scene.raycast(
            &ray,
            self.policy.highlight_max_distance,
            CollisionGroup::PLACED_OBJECTS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ray_plane_intersection;
    use approx::assert_relative_eq;

    /// Infinite planes at fixed heights
    struct PlaneScene {
        planes: Vec<(f32, CollisionGroup)>,
    }

    impl SceneRaycaster for PlaneScene {
        fn raycast(&self, ray: &Ray, max_distance: f32, mask: CollisionGroup) -> Option<RaycastHit> {
            self.planes
                .iter()
                .filter(|(_, group)| mask.intersects(*group))
                .filter_map(|(height, group)| {
                    let t = ray_plane_intersection(ray, Vec3::new(0.0, *height, 0.0), Vec3::Y)?;
                    (t <= max_distance).then(|| RaycastHit {
                        node: SceneNodeId::new(),
                        position: ray.at(t),
                        distance: t,
                        group: *group,
                    })
                })
                .min_by(|a, b| a.distance.total_cmp(&b.distance))
        }
    }

    fn floor(height: f32) -> PlaneScene {
        PlaneScene {
            planes: vec![(height, CollisionGroup::HORIZONTAL_PLANES)],
        }
    }

    fn device_at(height: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, height, 0.0))
    }

    #[test]
    fn test_horizontal_hit_places_on_plane_with_offset() {
        let resolver = PlacementResolver::default();
        // 15° down from 0.5 m above the floor hits about 1.93 m away
        let resolution = resolver.resolve(device_at(0.5), &floor(0.0));

        assert!(resolution.plane_found);
        let position = resolution.pose.w_axis.truncate();
        assert_relative_eq!(position.y, 0.01, epsilon = 1e-5);
        assert!(position.z < 0.0);
    }

    #[test]
    fn test_no_hit_uses_fallback_pose() {
        let resolver = PlacementResolver::default();
        let device = Mat4::from_rotation_translation(
            glam::Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            Vec3::new(1.0, 1.6, 0.0),
        );
        let empty = PlaneScene { planes: Vec::new() };

        let resolution = resolver.resolve(device, &empty);
        assert!(!resolution.plane_found);
        // Device faces -X after a quarter turn around Y
        let expected = Vec3::new(1.0 - 0.7, 1.6 + 0.07, 0.0);
        assert!(resolution.pose.w_axis.truncate().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn test_far_plane_falls_back() {
        let resolver = PlacementResolver::default();
        // 1.6 m above the floor the tilted ray needs about 6.2 m
        let resolution = resolver.resolve(device_at(1.6), &floor(0.0));
        assert!(!resolution.plane_found);
    }

    #[test]
    fn test_hit_closer_than_min_distance_falls_back() {
        let resolver = PlacementResolver::default();
        let resolution = resolver.resolve(device_at(0.03), &floor(0.0));
        assert!(!resolution.plane_found);
    }

    #[test]
    fn test_vertical_plane_hit_falls_back() {
        let resolver = PlacementResolver::default();
        let scene = PlaneScene {
            planes: vec![(0.0, CollisionGroup::VERTICAL_PLANES)],
        };
        let resolution = resolver.resolve(device_at(0.5), &scene);
        assert!(!resolution.plane_found);
    }

    #[test]
    fn test_indicator_toggle() {
        let mut location = PlacementLocation::new();
        location.apply_indicator_toggle(true, false);
        assert!(location.child(TOOLTIP_CHILD).unwrap().enabled);

        let mut location = PlacementLocation::new().with_indicator("ring");
        location.apply_indicator_toggle(true, false);
        assert!(location.child("ring").unwrap().enabled);

        location.apply_indicator_toggle(true, true);
        assert!(!location.child("ring").unwrap().enabled);

        location.apply_indicator_toggle(false, false);
        assert!(!location.child("ring").unwrap().enabled);
        assert!(location.child(TOOLTIP_CHILD).unwrap().enabled);
    }

    #[test]
    fn test_update_writes_state_and_location() {
        let resolver = PlacementResolver::default();
        let mut state = PlacementState::new();
        let mut location = PlacementLocation::new().with_indicator("ring");

        let resolution = resolver.update(&mut state, &mut location, device_at(0.5), &floor(0.0));
        assert!(state.plane_to_project_on_found);
        assert_eq!(location.transform, resolution.pose);
        assert!(location.child("ring").unwrap().enabled);
    }
}
