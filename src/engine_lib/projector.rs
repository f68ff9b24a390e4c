// src/engine_lib/projector.rs
//
// Oblique near-plane projection (Lengyel) for portal cameras, using the
// [0, 1] clip depth range of glam's `perspective_rh`.

use glam::{Mat4, Vec4};
use log::debug;

use crate::engine_lib::transform::{Plane, Transform};

/// Smallest distance, in camera space, kept between the eye and the clip plane.
pub const CLIP_EPSILON: f32 = 1e-4;

/// Plane of the exit portal, facing away from the surface it sits on.
/// Everything on its positive side is what the exit looks out onto.
pub fn portal_clip_plane(exit: &Transform) -> Plane {
    Plane::from_normal_and_point(-exit.forward(), exit.position)
}

/// Transforms a world-space plane into camera space.
pub fn plane_to_camera_space(world_to_camera: Mat4, plane: &Plane) -> Vec4 {
    world_to_camera.inverse().transpose() * plane.to_vec4()
}

/// Replaces the near plane of `base` with `clip_plane_world` so that nothing on
/// the plane's negative side is rasterized.
///
/// Inputs that would break the construction are clamped instead of producing
/// NaN: a camera on (or within `CLIP_EPSILON` of) the plane gets the plane
/// pushed just ahead of the eye, and an unusable plane or a camera on the
/// plane's positive side falls back to `base`.
pub fn oblique_projection(base: Mat4, world_to_camera: Mat4, clip_plane_world: &Plane) -> Mat4 {
    let mut clip = plane_to_camera_space(world_to_camera, clip_plane_world);

    let normal_length = clip.truncate().length();
    if !normal_length.is_finite() || !clip.w.is_finite() || normal_length < CLIP_EPSILON {
        debug!("degenerate portal clip plane {clip:?}, keeping base projection");
        return base;
    }
    clip /= normal_length;

    if clip.w > CLIP_EPSILON {
        // eye already on the visible side, an oblique near plane would cut the view
        return base;
    }
    clip.w = clip.w.min(-CLIP_EPSILON);

    // clip-space corner opposite the plane, pulled back into camera space
    let corner = Vec4::new(clip.x.signum(), clip.y.signum(), 1.0, 1.0);
    let q = base.inverse() * corner;

    let mut denominator = clip.dot(q);
    if denominator.abs() < CLIP_EPSILON {
        denominator = CLIP_EPSILON.copysign(denominator);
    }
    let row = clip * (base.row(3).dot(q) / denominator);

    let mut oblique = base;
    oblique.x_axis.z = row.x;
    oblique.y_axis.z = row.y;
    oblique.z_axis.z = row.z;
    oblique.w_axis.z = row.w;

    if !oblique.is_finite() {
        debug!("oblique projection not finite for plane {clip:?}, keeping base projection");
        return base;
    }
    oblique
}
