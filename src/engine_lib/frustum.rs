// src/engine_lib/frustum.rs

use glam::{Mat4, Vec3, Vec4};

use crate::engine_lib::transform::{OrientedBox, Plane};

/// View frustum as six inward-facing planes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the planes of a `[0, 1]` depth view-projection matrix.
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let r0 = view_projection.row(0);
        let r1 = view_projection.row(1);
        let r2 = view_projection.row(2);
        let r3 = view_projection.row(3);

        Self {
            planes: [
                plane_from_row(r3 + r0), // left
                plane_from_row(r3 - r0), // right
                plane_from_row(r3 + r1), // bottom
                plane_from_row(r3 - r1), // top
                plane_from_row(r2),      // near
                plane_from_row(r3 - r2), // far
            ],
        }
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(point) >= 0.0)
    }

    /// Conservative: may report boxes near a frustum corner as visible.
    pub fn intersects_obb(&self, bounds: &OrientedBox) -> bool {
        self.planes.iter().all(|plane| {
            plane.signed_distance(bounds.center) >= -bounds.projected_radius(plane.normal)
        })
    }
}

fn plane_from_row(row: Vec4) -> Plane {
    let length = row.truncate().length();
    if length <= f32::EPSILON || !length.is_finite() {
        // an unusable plane should cull nothing
        return Plane { normal: Vec3::ZERO, distance: 0.0 };
    }
    Plane { normal: row.truncate() / length, distance: row.w / length }
}
