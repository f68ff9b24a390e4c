// src/engine_lib/placement.rs

use glam::{Quat, UVec2};
use log::{debug, info, warn};

use crate::engine_lib::config::PortalConfig;
use crate::engine_lib::portal::{Portal, SurfaceContact};
use crate::engine_lib::registry::{PortalHandle, PortalRegistry};

/// Forwards placement requests to portals and advances their growth once per
/// frame. Holds no portal state of its own.
pub struct PortalPlacementController {
    config: PortalConfig,
    viewport: UVec2,
}

impl PortalPlacementController {
    pub fn new(config: PortalConfig, viewport: UVec2) -> Self {
        Self { config: config.sanitize(), viewport: viewport.max(UVec2::ONE) }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Applies to portals spawned afterwards.
    pub fn set_config(&mut self, config: PortalConfig) {
        self.config = config.sanitize();
    }

    pub fn resize(&mut self, viewport: UVec2) {
        self.viewport = viewport.max(UVec2::ONE);
    }

    pub fn viewport(&self) -> UVec2 {
        self.viewport
    }

    /// Spawns two unplaced portals linked to each other.
    pub fn spawn_pair(
        &self,
        registry: &mut PortalRegistry,
        names: [&str; 2],
        colors: [[f32; 4]; 2],
    ) -> (PortalHandle, PortalHandle) {
        let a = registry.spawn(Portal::new(names[0], &self.config).with_color(colors[0]));
        let b = registry.spawn(Portal::new(names[1], &self.config).with_color(colors[1]));
        registry.link(a, b);
        info!("spawned portal pair '{}' <-> '{}'", names[0], names[1]);
        (a, b)
    }

    pub fn link(&self, registry: &mut PortalRegistry, a: PortalHandle, b: PortalHandle) -> bool {
        registry.link(a, b)
    }

    /// Tries to place `handle` at `contact`. Other placed portals count as
    /// obstructions. Returns false, leaving the portal untouched, on rejection.
    pub fn request_placement(
        &self,
        registry: &mut PortalRegistry,
        handle: PortalHandle,
        contact: &SurfaceContact,
        desired_rotation: Quat,
    ) -> bool {
        let obstructions = registry.placed_bounds_except(handle);
        let Some(portal) = registry.get_mut(handle) else {
            warn!("placement requested for a destroyed portal");
            return false;
        };
        match portal.place(contact, desired_rotation, &obstructions, self.viewport) {
            Ok(()) => {
                info!("placed portal '{}'", portal.name);
                true
            }
            Err(e) => {
                debug!("placement of '{}' rejected: {e}", portal.name);
                false
            }
        }
    }

    /// Advances every placed, still growing portal by `dt` seconds. Returns how
    /// many are still growing afterwards.
    pub fn advance(&self, registry: &mut PortalRegistry, dt: f32) -> usize {
        let mut growing = 0;
        for (_, portal) in registry.iter_mut() {
            if portal.is_placed() && portal.advance_growth(dt) {
                growing += 1;
            }
        }
        growing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_lib::portal::{PlacementSurface, PortalState};
    use glam::{Vec2, Vec3};

    const COLORS: [[f32; 4]; 2] = [[0.2, 0.4, 1.0, 1.0], [1.0, 0.5, 0.1, 1.0]];

    fn wall_contact(x: f32) -> SurfaceContact {
        let surface = PlacementSurface::new(Vec3::new(0.0, 1.5, -3.0), Vec3::Z, Vec3::Y, Vec2::new(4.0, 1.5));
        SurfaceContact { point: Vec3::new(x, 1.5, -3.0), surface }
    }

    fn controller() -> PortalPlacementController {
        let config = PortalConfig { growth_duration_s: 1.0, max_radius: 2.0, ..PortalConfig::default() };
        PortalPlacementController::new(config, UVec2::new(320, 200))
    }

    #[test]
    fn pair_is_spawned_linked_and_unplaced() {
        let mut registry = PortalRegistry::new();
        let (a, b) = controller().spawn_pair(&mut registry, ["blue", "orange"], COLORS);
        assert_eq!(registry.partner_of(a), Some(b));
        assert_eq!(registry.partner_of(b), Some(a));
        let portal = registry.get(a).unwrap();
        assert_eq!(portal.state(), PortalState::Unplaced);
        assert_eq!(portal.growth_radius(), 0.0);
        assert!(portal.output().is_none());
        assert_eq!(portal.color, COLORS[0]);
    }

    #[test]
    fn other_portals_obstruct_placement() {
        let controller = controller();
        let mut registry = PortalRegistry::new();
        let (a, b) = controller.spawn_pair(&mut registry, ["blue", "orange"], COLORS);

        assert!(controller.request_placement(&mut registry, a, &wall_contact(0.0), Quat::IDENTITY));
        assert!(!controller.request_placement(&mut registry, b, &wall_contact(0.5), Quat::IDENTITY));
        assert!(!registry.get(b).unwrap().is_placed());
        assert!(controller.request_placement(&mut registry, b, &wall_contact(2.5), Quat::IDENTITY));

        // a portal never obstructs itself when moved
        assert!(controller.request_placement(&mut registry, a, &wall_contact(-0.2), Quat::IDENTITY));
    }

    #[test]
    fn placement_uses_current_viewport() {
        let mut controller = controller();
        let mut registry = PortalRegistry::new();
        let (a, _) = controller.spawn_pair(&mut registry, ["blue", "orange"], COLORS);
        controller.resize(UVec2::new(1024, 768));
        assert!(controller.request_placement(&mut registry, a, &wall_contact(0.0), Quat::IDENTITY));
        assert_eq!(registry.get(a).unwrap().output().unwrap().size, UVec2::new(1024, 768));
    }

    #[test]
    fn destroyed_portal_cannot_be_placed() {
        let controller = controller();
        let mut registry = PortalRegistry::new();
        let (a, _) = controller.spawn_pair(&mut registry, ["blue", "orange"], COLORS);
        registry.destroy(a);
        assert!(!controller.request_placement(&mut registry, a, &wall_contact(0.0), Quat::IDENTITY));
    }

    #[test]
    fn only_placed_portals_grow() {
        let controller = controller();
        let mut registry = PortalRegistry::new();
        let (a, b) = controller.spawn_pair(&mut registry, ["blue", "orange"], COLORS);
        controller.request_placement(&mut registry, a, &wall_contact(-2.0), Quat::IDENTITY);

        assert_eq!(controller.advance(&mut registry, 0.25), 1);
        assert!((registry.get(a).unwrap().growth_radius() - 0.5).abs() < 1e-5);
        assert_eq!(registry.get(b).unwrap().growth_radius(), 0.0);

        assert_eq!(controller.advance(&mut registry, 5.0), 0);
        assert_eq!(registry.get(a).unwrap().growth_radius(), 2.0);
        assert_eq!(controller.advance(&mut registry, 0.1), 0);
    }
}
