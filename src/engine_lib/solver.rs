// src/engine_lib/solver.rs
//
// Virtual camera placement for recursive portal views.

use std::f32::consts::PI;

use glam::Quat;

use crate::engine_lib::transform::Transform;

/// Entry and exit closer than this are treated as the same portal.
pub const SELF_PORTAL_EPSILON: f32 = 1e-5;

/// Half turn about the portal's up axis. Maps the front of the entry onto the
/// front of the exit so walking through feels continuous instead of mirrored.
pub fn portal_twist() -> Quat {
    Quat::from_rotation_y(PI)
}

/// One bounce: re-expresses `camera` relative to `exit` as it is relative to
/// `entry`, turned half way round the portal's up axis.
pub fn map_through(entry: &Transform, exit: &Transform, camera: &Transform) -> Transform {
    if entry.approx_eq(exit, SELF_PORTAL_EPSILON) {
        return *camera;
    }

    let twist = portal_twist();

    let local_position = entry.inverse_transform_point(camera.position);
    let local_rotation = entry.rotation.inverse() * camera.rotation;

    let twisted_position = twist * local_position;
    let twisted_rotation = twist * local_rotation;

    Transform {
        position: exit.transform_point(twisted_position),
        rotation: (exit.rotation * twisted_rotation).normalize(),
        scale: camera.scale,
    }
}

/// Virtual camera for recursion `depth`: `depth + 1` applications of
/// `map_through` starting from the viewer.
pub fn solve(entry: &Transform, exit: &Transform, viewer: &Transform, depth: u32) -> Transform {
    (0..=depth).fold(*viewer, |camera, _| map_through(entry, exit, &camera))
}

/// Virtual cameras for every depth below `iterations`, deepest first. This is
/// the submission order: each shallower pass samples the image the deeper one
/// just produced.
pub fn solve_depths(entry: &Transform, exit: &Transform, viewer: &Transform, iterations: u32) -> Vec<(u32, Transform)> {
    let mut chain = Vec::with_capacity(iterations as usize);
    let mut camera = *viewer;
    for depth in 0..iterations {
        camera = map_through(entry, exit, &camera);
        chain.push((depth, camera));
    }
    chain.reverse();
    chain
}
