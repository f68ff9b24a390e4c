// src/engine_lib/scheduler.rs
//
// Per-frame driver for portal passes. Runs before the main view is drawn so
// every portal surface samples an image finished earlier in the same frame.

use log::debug;

use crate::engine_lib::camera::{ViewerState, VirtualCamera};
use crate::engine_lib::config::{MAX_ITERATIONS, MIN_ITERATIONS};
use crate::engine_lib::portal::{OutputBuffer, Portal};
use crate::engine_lib::projector::{oblique_projection, portal_clip_plane};
use crate::engine_lib::registry::{PortalHandle, PortalRegistry};
use crate::engine_lib::solver::solve_depths;
use crate::engine_lib::transform::{OrientedBox, Transform};

pub const DEFAULT_ITERATIONS: u32 = 7;

/// Receives one render submission per portal pass.
pub trait SceneRenderer {
    /// Draws the scene from `camera` into the storage described by `target`.
    /// `camera.target` names the portal that owns it.
    fn render_portal_view(&mut self, camera: &VirtualCamera, target: &OutputBuffer);
}

/// What one `render_all` call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub portals_rendered: u32,
    pub passes: u32,
    pub skipped_unplaced: u32,
    pub skipped_unlinked: u32,
    pub skipped_stale: u32,
    pub skipped_invisible: u32,
    pub reallocated: u32,
}

struct PortalPair {
    entry: Transform,
    exit: Transform,
    exit_handle: PortalHandle,
    entry_bounds: OrientedBox,
    exit_bounds: OrientedBox,
}

pub struct PortalRenderScheduler {
    iterations: u32,
    frame: u64,
    camera: VirtualCamera,
}

impl Default for PortalRenderScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl PortalRenderScheduler {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.clamp(MIN_ITERATIONS, MAX_ITERATIONS),
            frame: 0,
            camera: VirtualCamera::default(),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn set_iterations(&mut self, iterations: u32) {
        let clamped = iterations.clamp(MIN_ITERATIONS, MAX_ITERATIONS);
        if clamped != self.iterations {
            debug!("portal recursion set to {clamped}");
        }
        self.iterations = clamped;
    }

    /// Index of the last frame passed to `render_all`.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// The camera of the most recent submission.
    pub fn virtual_camera(&self) -> &VirtualCamera {
        &self.camera
    }

    /// Submits every portal pass for this frame.
    ///
    /// Each placed portal whose partner is alive and placed gets `iterations`
    /// passes into its own output, deepest first, provided it or its partner
    /// is inside the viewer's frustum.
    pub fn render_all<R>(&mut self, viewer: &ViewerState, registry: &mut PortalRegistry, renderer: &mut R) -> FrameReport
    where
        R: SceneRenderer + ?Sized,
    {
        self.frame += 1;
        let mut report = FrameReport { frame: self.frame, ..FrameReport::default() };

        let frustum = viewer.frustum();
        let base = viewer.base_projection();

        for handle in registry.handles() {
            let Some(pair) = resolve_pair(registry, handle, &mut report) else {
                continue;
            };
            if !frustum.intersects_obb(&pair.entry_bounds) && !frustum.intersects_obb(&pair.exit_bounds) {
                report.skipped_invisible += 1;
                continue;
            }

            let Some(portal) = registry.get_mut(handle) else {
                continue;
            };
            if portal.ensure_output(viewer.viewport) {
                report.reallocated += 1;
            }
            let Some(target) = portal.output().cloned() else {
                continue;
            };

            let clip_plane = portal_clip_plane(&pair.exit);
            for (depth, transform) in solve_depths(&pair.entry, &pair.exit, &viewer.transform, self.iterations) {
                let world_to_camera = transform.world_to_camera();
                self.camera = VirtualCamera {
                    transform,
                    world_to_camera,
                    projection: oblique_projection(base, world_to_camera, &clip_plane),
                    target: Some(handle),
                    exit: Some(pair.exit_handle),
                    depth,
                };
                renderer.render_portal_view(&self.camera, &target);
                report.passes += 1;
            }

            if let Some(output) = registry.get_mut(handle).and_then(Portal::output_mut) {
                output.mark_written(self.frame);
            }
            report.portals_rendered += 1;
        }

        report
    }
}

fn resolve_pair(registry: &PortalRegistry, handle: PortalHandle, report: &mut FrameReport) -> Option<PortalPair> {
    let entry = registry.get(handle)?;
    if !entry.is_placed() {
        report.skipped_unplaced += 1;
        return None;
    }
    let Some(exit_handle) = entry.partner() else {
        report.skipped_unlinked += 1;
        return None;
    };
    let Some(exit) = registry.get(exit_handle) else {
        debug!("portal '{}' has a stale partner, skipping", entry.name);
        report.skipped_stale += 1;
        return None;
    };
    if !exit.is_placed() {
        report.skipped_unplaced += 1;
        return None;
    }
    Some(PortalPair {
        entry: entry.transform(),
        exit: exit.transform(),
        exit_handle,
        entry_bounds: entry.bounding_volume(),
        exit_bounds: exit.bounding_volume(),
    })
}
