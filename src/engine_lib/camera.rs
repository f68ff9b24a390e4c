// src/engine_lib/camera.rs

use glam::{Mat4, UVec2};

use crate::engine_lib::config::PortalConfig;
use crate::engine_lib::frustum::Frustum;
use crate::engine_lib::registry::PortalHandle;
use crate::engine_lib::transform::Transform;

/// The physical viewer: pose plus projection parameters. Refreshed once per
/// frame before any portal pass and read-only to the portal system.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewerState {
    pub transform: Transform,
    pub fov_y_rad: f32,
    pub znear: f32,
    pub zfar: f32,
    pub viewport: UVec2,
}

impl ViewerState {
    pub fn new(transform: Transform, fov_y_deg: f32, znear: f32, zfar: f32, viewport: UVec2) -> Self {
        Self {
            transform,
            fov_y_rad: fov_y_deg.to_radians(),
            znear,
            zfar,
            viewport: viewport.max(UVec2::ONE),
        }
    }

    pub fn from_config(transform: Transform, config: &PortalConfig, viewport: UVec2) -> Self {
        Self::new(transform, config.fov_y_deg, config.znear, config.zfar, viewport)
    }

    pub fn aspect(&self) -> f32 {
        let viewport = self.viewport.max(UVec2::ONE);
        viewport.x as f32 / viewport.y as f32
    }

    pub fn world_to_camera(&self) -> Mat4 {
        self.transform.world_to_camera()
    }

    /// Symmetric perspective with depth in [0, 1].
    pub fn base_projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_rad, self.aspect(), self.znear, self.zfar)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.base_projection() * self.world_to_camera()
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection())
    }
}

/// The shared camera used for every portal pass. Exactly one configuration is
/// current at a time; the scheduler overwrites all of it before each submission.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VirtualCamera {
    pub transform: Transform,
    pub world_to_camera: Mat4,
    pub projection: Mat4,
    /// Portal whose output this pass writes.
    pub target: Option<PortalHandle>,
    /// Portal the camera looks out of. Its own surface lies on the near plane.
    pub exit: Option<PortalHandle>,
    pub depth: u32,
}

impl Default for VirtualCamera {
    fn default() -> Self {
        Self {
            transform: Transform::IDENTITY,
            world_to_camera: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            target: None,
            exit: None,
            depth: 0,
        }
    }
}

impl VirtualCamera {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.world_to_camera
    }
}
