//! Pose, ray and plane math
//!
//! Conventions: world space is Y-up, a device looks along its local -Z axis.

use glam::{Mat3, Mat4, Quat, Vec3};

use crate::types::Transform;

const EPSILON: f32 = 1e-6;

/// A ray with a normalized direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// An infinite plane through `point` with unit `normal`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePlane {
    pub point: Vec3,
    pub normal: Vec3,
}

impl SurfacePlane {
    pub fn new(point: Vec3, normal: Vec3) -> Self {
        Self {
            point,
            normal: normal.normalize_or_zero(),
        }
    }

    pub fn horizontal(height: f32) -> Self {
        Self::new(Vec3::new(0.0, height, 0.0), Vec3::Y)
    }

    /// Unsigned distance from a point to the plane
    pub fn distance_to(&self, point: Vec3) -> f32 {
        (point - self.point).dot(self.normal).abs()
    }

    pub fn project(&self, point: Vec3) -> Vec3 {
        project_point_onto_plane(point, self.point, self.normal)
    }
}

/// Build the placement ray for a device pose.
///
/// The ray starts at the device origin and follows the device's forward axis
/// tilted downward by `tilt_degrees` around the device's local X axis.
pub fn placement_ray(device_pose: Mat4, tilt_degrees: f32) -> Ray {
    let tilt = Quat::from_rotation_x(-tilt_degrees.to_radians());
    let ray_frame = device_pose * Mat4::from_quat(tilt);
    let origin = ray_frame.w_axis.truncate();
    let direction = -ray_frame.z_axis.truncate();
    Ray::new(origin, direction)
}

/// Calculate ray-plane intersection.
///
/// Returns the parameter t such that `ray.at(t)` lies on the plane through
/// `plane_point` with `plane_normal`, or None if the ray is parallel to the
/// plane or the intersection is behind the origin.
pub fn ray_plane_intersection(ray: &Ray, plane_point: Vec3, plane_normal: Vec3) -> Option<f32> {
    let denom = ray.direction.dot(plane_normal);

    if denom.abs() < EPSILON {
        return None;
    }

    let t = (plane_point - ray.origin).dot(plane_normal) / denom;

    if t > 0.0 { Some(t) } else { None }
}

/// Ray-AABB (Axis-Aligned Bounding Box) intersection test
/// Returns the distance to intersection if hit, None otherwise
pub fn ray_aabb_intersection(ray: &Ray, bbox_min: Vec3, bbox_max: Vec3) -> Option<f32> {
    let inv_dir = Vec3::new(
        1.0 / ray.direction.x,
        1.0 / ray.direction.y,
        1.0 / ray.direction.z,
    );

    let t1 = (bbox_min.x - ray.origin.x) * inv_dir.x;
    let t2 = (bbox_max.x - ray.origin.x) * inv_dir.x;
    let t3 = (bbox_min.y - ray.origin.y) * inv_dir.y;
    let t4 = (bbox_max.y - ray.origin.y) * inv_dir.y;
    let t5 = (bbox_min.z - ray.origin.z) * inv_dir.z;
    let t6 = (bbox_max.z - ray.origin.z) * inv_dir.z;

    let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
    let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

    if tmax < 0.0 || tmin > tmax {
        return None;
    }

    Some(if tmin < 0.0 { tmax } else { tmin })
}

/// Re-derive a pose's up axis to match world vertical while keeping its yaw.
///
/// The forward (Z) axis is projected onto the horizontal plane; pitch and roll
/// are discarded. Translation is preserved.
pub fn gravity_aligned(pose: Mat4) -> Mat4 {
    let z_axis = pose.z_axis.truncate();
    let forward = Vec3::new(z_axis.x, 0.0, z_axis.z)
        .try_normalize()
        .unwrap_or(Vec3::Z);
    let up = Vec3::Y;
    let right = up.cross(forward).normalize();

    Mat4::from_cols(
        right.extend(0.0),
        up.extend(0.0),
        forward.extend(0.0),
        pose.w_axis,
    )
}

/// Replace the translation column of a pose
pub fn with_translation(pose: Mat4, translation: Vec3) -> Mat4 {
    let mut result = pose;
    result.w_axis = translation.extend(1.0);
    result
}

/// Project `vector` onto the direction of `onto`
pub fn project_onto(vector: Vec3, onto: Vec3) -> Vec3 {
    let len_sq = onto.length_squared();
    if len_sq < EPSILON {
        return Vec3::ZERO;
    }
    onto * (vector.dot(onto) / len_sq)
}

/// Orthogonally project a point onto a plane
pub fn project_point_onto_plane(point: Vec3, plane_point: Vec3, plane_normal: Vec3) -> Vec3 {
    point - project_onto(point - plane_point, plane_normal)
}

/// Decompose an anchor pose matrix into translation, rotation and per-axis scale.
///
/// Scale is the length of each basis column; rotation is taken from the
/// basis after removing that scale.
pub fn decompose_anchor_matrix(matrix: Mat4) -> Transform {
    let translation = matrix.w_axis.truncate();

    let x = matrix.x_axis.truncate();
    let y = matrix.y_axis.truncate();
    let z = matrix.z_axis.truncate();
    let scale = Vec3::new(x.length(), y.length(), z.length());

    let rotation = if scale.min_element() > EPSILON {
        Quat::from_mat3(&Mat3::from_cols(x / scale.x, y / scale.y, z / scale.z)).normalize()
    } else {
        Quat::IDENTITY
    };

    Transform::new(translation, rotation, scale)
}
