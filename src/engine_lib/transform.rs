// src/engine_lib/transform.rs

use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

/// Smallest scale magnitude used when inverting a transform.
pub const MIN_SCALE: f32 = 1e-6;

/// World-space pose of a portal or camera.
///
/// Forward is local -Z, up is local +Y, right is local +X.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
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
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation, scale: Vec3::ONE }
    }

    pub fn from_translation(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    /// Pose at `position` whose forward axis points along `forward`.
    pub fn looking_to(position: Vec3, forward: Vec3, up: Vec3) -> Self {
        Self::new(position, rotation_looking_to(forward, up))
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// View matrix of a camera sitting at this pose. Scale is ignored.
    pub fn world_to_camera(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position).inverse()
    }

    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * (self.scale * local)
    }

    /// Inverse of `transform_point`. Zero scale components are clamped to
    /// `MIN_SCALE` so the result stays finite.
    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        safe_recip(self.scale) * (self.rotation.inverse() * (world - self.position))
    }

    pub fn approx_eq(&self, other: &Transform, epsilon: f32) -> bool {
        self.position.abs_diff_eq(other.position, epsilon)
            && self.scale.abs_diff_eq(other.scale, epsilon)
            // q and -q are the same rotation
            && self.rotation.dot(other.rotation).abs() >= 1.0 - epsilon
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }
}

/// Rotation mapping local -Z onto `forward` and keeping local +Y as close to
/// `up` as possible.
pub fn rotation_looking_to(forward: Vec3, up: Vec3) -> Quat {
    let forward = forward.normalize_or_zero();
    if forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let mut right = forward.cross(up);
    if right.length_squared() < 1e-8 {
        // up is parallel to forward, pick any perpendicular axis
        let fallback = if forward.y.abs() < 0.9 { Vec3::Y } else { Vec3::Z };
        right = forward.cross(fallback);
    }
    let right = right.normalize();
    let up = right.cross(forward);
    Quat::from_mat3(&Mat3::from_cols(right, up, -forward)).normalize()
}

fn safe_recip(scale: Vec3) -> Vec3 {
    let clamp = |s: f32| {
        if s.abs() < MIN_SCALE {
            MIN_SCALE.copysign(s)
        } else {
            s
        }
    };
    Vec3::new(clamp(scale.x), clamp(scale.y), clamp(scale.z)).recip()
}

/// Plane `normal . p + distance = 0`; positive signed distance is the side the
/// normal points to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn from_normal_and_point(normal: Vec3, point: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self { normal, distance: -normal.dot(point) }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    pub fn to_vec4(&self) -> Vec4 {
        self.normal.extend(self.distance)
    }
}

/// Oriented bounding box used for visibility and placement overlap tests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedBox {
    pub center: Vec3,
    pub half_extents: Vec3,
    pub rotation: Quat,
}

impl OrientedBox {
    pub fn new(center: Vec3, half_extents: Vec3, rotation: Quat) -> Self {
        Self { center, half_extents: half_extents.abs(), rotation }
    }

    pub fn axes(&self) -> [Vec3; 3] {
        [self.rotation * Vec3::X, self.rotation * Vec3::Y, self.rotation * Vec3::Z]
    }

    /// Half length of the box's shadow on `axis`.
    pub fn projected_radius(&self, axis: Vec3) -> f32 {
        let [x, y, z] = self.axes();
        self.half_extents.x * x.dot(axis).abs()
            + self.half_extents.y * y.dot(axis).abs()
            + self.half_extents.z * z.dot(axis).abs()
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let [x, y, z] = self.axes();
        let (hx, hy, hz) = (x * self.half_extents.x, y * self.half_extents.y, z * self.half_extents.z);
        let c = self.center;
        [
            c - hx - hy - hz, c + hx - hy - hz, c + hx + hy - hz, c - hx + hy - hz,
            c - hx - hy + hz, c + hx - hy + hz, c + hx + hy + hz, c - hx + hy + hz,
        ]
    }

    /// Separating axis test. Boxes that only touch count as overlapping.
    pub fn intersects(&self, other: &OrientedBox) -> bool {
        let a = self.axes();
        let b = other.axes();
        let offset = other.center - self.center;

        let mut candidates = Vec::with_capacity(15);
        candidates.extend_from_slice(&a);
        candidates.extend_from_slice(&b);
        for axis_a in &a {
            for axis_b in &b {
                let cross = axis_a.cross(*axis_b);
                // parallel edges are already covered by the face axes
                if cross.length_squared() > 1e-6 {
                    candidates.push(cross.normalize());
                }
            }
        }

        candidates.iter().all(|axis| {
            offset.dot(*axis).abs() <= self.projected_radius(*axis) + other.projected_radius(*axis)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn forward_is_negative_z() {
        let t = Transform::IDENTITY;
        assert!(t.forward().abs_diff_eq(Vec3::NEG_Z, 1e-6));
        let turned = Transform::new(Vec3::ZERO, Quat::from_rotation_y(PI));
        assert!(turned.forward().abs_diff_eq(Vec3::Z, 1e-6));
    }

    #[test]
    fn inverse_transform_point_undoes_transform_point() {
        let t = Transform::new(Vec3::new(1.0, -2.0, 3.0), Quat::from_rotation_x(0.7) * Quat::from_rotation_y(-1.2))
            .with_scale(Vec3::new(2.0, 0.5, 1.5));
        let p = Vec3::new(0.3, 4.0, -7.5);
        let back = t.inverse_transform_point(t.transform_point(p));
        assert!(back.abs_diff_eq(p, 1e-4), "{back:?}");
    }

    #[test]
    fn zero_scale_inverse_stays_finite() {
        let t = Transform::from_translation(Vec3::ONE).with_scale(Vec3::new(0.0, 1.0, 0.0));
        assert!(t.inverse_transform_point(Vec3::new(5.0, 5.0, 5.0)).is_finite());
    }

    #[test]
    fn looking_to_aligns_forward_and_up() {
        let t = Transform::looking_to(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0), Vec3::Y);
        assert!(t.forward().abs_diff_eq(Vec3::new(1.0, 0.0, 1.0).normalize(), 1e-5));
        assert!(t.up().abs_diff_eq(Vec3::Y, 1e-5));

        // forward parallel to the hint still yields an orthonormal frame
        let down = Transform::looking_to(Vec3::ZERO, Vec3::NEG_Y, Vec3::Y);
        assert!(down.forward().abs_diff_eq(Vec3::NEG_Y, 1e-5));
        assert!(down.up().dot(down.forward()).abs() < 1e-5);
    }

    #[test]
    fn approx_eq_treats_negated_quaternion_as_equal() {
        let a = Transform::new(Vec3::X, Quat::from_rotation_z(0.4));
        let b = Transform { rotation: -a.rotation, ..a };
        assert!(a.approx_eq(&b, 1e-5));
        assert!(!a.approx_eq(&Transform::new(Vec3::X, Quat::from_rotation_z(0.5)), 1e-5));
    }

    #[test]
    fn plane_signed_distance() {
        let plane = Plane::from_normal_and_point(Vec3::new(0.0, 0.0, 2.0), Vec3::new(0.0, 0.0, 3.0));
        assert!((plane.signed_distance(Vec3::new(4.0, 1.0, 5.0)) - 2.0).abs() < 1e-6);
        assert!((plane.signed_distance(Vec3::ZERO) + 3.0).abs() < 1e-6);
    }

    #[test]
    fn oriented_boxes_overlap_and_separate() {
        let a = OrientedBox::new(Vec3::ZERO, Vec3::ONE, Quat::IDENTITY);
        let near = OrientedBox::new(Vec3::new(1.9, 0.0, 0.0), Vec3::ONE, Quat::IDENTITY);
        let far = OrientedBox::new(Vec3::new(2.1, 0.0, 0.0), Vec3::ONE, Quat::IDENTITY);
        assert!(a.intersects(&near));
        assert!(!a.intersects(&far));

        // a diamond-rotated box reaches further along x
        let rotated = OrientedBox::new(Vec3::new(2.3, 0.0, 0.0), Vec3::ONE, Quat::from_rotation_z(FRAC_PI_4));
        assert!(a.intersects(&rotated));
        let rotated_far = OrientedBox::new(Vec3::new(2.5, 0.0, 0.0), Vec3::ONE, Quat::from_rotation_z(FRAC_PI_4));
        assert!(!a.intersects(&rotated_far));
    }

    #[test]
    fn projected_radius_of_rotated_box() {
        let b = OrientedBox::new(Vec3::ZERO, Vec3::new(2.0, 1.0, 0.5), Quat::from_rotation_z(FRAC_PI_2));
        assert!((b.projected_radius(Vec3::X) - 1.0).abs() < 1e-5);
        assert!((b.projected_radius(Vec3::Y) - 2.0).abs() < 1e-5);
    }
}
