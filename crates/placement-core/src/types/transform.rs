//! Transform type definition

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// World transform (translation, orientation and scale)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Map a point from this transform's local frame into world space
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.to_mat4().transform_point3(local)
    }

    /// Map a world-space point into this transform's local frame
    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        self.to_mat4().inverse().transform_point3(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_round_trip_through_scaled_frame() {
        let transform = Transform::new(
            Vec3::new(1.0, 0.5, -2.0),
            Quat::from_rotation_y(0.7),
            Vec3::new(2.0, 1.0, 0.5),
        );
        let local = Vec3::new(0.1, 0.2, 0.3);
        let world = transform.transform_point(local);
        let back = transform.inverse_transform_point(world);
        assert!(back.abs_diff_eq(local, 1e-5));
    }
}
