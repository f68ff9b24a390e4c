// src/engine_lib/registry.rs

use log::debug;

use crate::engine_lib::portal::Portal;
use crate::engine_lib::transform::OrientedBox;

/// Generation-checked reference to a portal in a `PortalRegistry`.
///
/// Handles never keep a portal alive. Once the portal is destroyed every
/// lookup through the handle fails, even if the slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortalHandle(hecs::Entity);

impl PortalHandle {
    pub fn id(&self) -> u32 {
        self.0.id()
    }
}

/// Arena owning every portal of a scene.
#[derive(Default)]
pub struct PortalRegistry {
    world: hecs::World,
}

impl PortalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, portal: Portal) -> PortalHandle {
        let handle = PortalHandle(self.world.spawn((portal,)));
        debug!("spawned portal {:?}", handle);
        handle
    }

    /// Removes the portal. Its partner keeps a now stale handle.
    pub fn destroy(&mut self, handle: PortalHandle) -> Option<Portal> {
        let portal = self.world.remove_one::<Portal>(handle.0).ok()?;
        let _ = self.world.despawn(handle.0);
        debug!("destroyed portal {:?} ({})", handle, portal.name);
        Some(portal)
    }

    pub fn contains(&self, handle: PortalHandle) -> bool {
        self.world.contains(handle.0)
    }

    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, handle: PortalHandle) -> Option<hecs::Ref<'_, Portal>> {
        self.world.get::<&Portal>(handle.0).ok()
    }

    pub fn get_mut(&mut self, handle: PortalHandle) -> Option<&mut Portal> {
        self.world.query_one_mut::<&mut Portal>(handle.0).ok()
    }

    /// Live handles, sorted so per-frame iteration order is stable.
    pub fn handles(&self) -> Vec<PortalHandle> {
        let mut handles: Vec<PortalHandle> = self
            .world
            .query::<&Portal>()
            .iter()
            .map(|(entity, _)| PortalHandle(entity))
            .collect();
        handles.sort();
        handles
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PortalHandle, &mut Portal)> + '_ {
        self.world
            .query_mut::<&mut Portal>()
            .into_iter()
            .map(|(entity, portal)| (PortalHandle(entity), portal))
    }

    /// Links two portals to each other. Fails if either handle is stale.
    pub fn link(&mut self, a: PortalHandle, b: PortalHandle) -> bool {
        if !self.contains(a) || !self.contains(b) {
            return false;
        }
        if let Some(portal) = self.get_mut(a) {
            portal.set_partner(Some(b));
        }
        if let Some(portal) = self.get_mut(b) {
            portal.set_partner(Some(a));
        }
        true
    }

    /// The partner of `handle`, if both are alive.
    pub fn partner_of(&self, handle: PortalHandle) -> Option<PortalHandle> {
        let partner = self.get(handle)?.partner()?;
        self.contains(partner).then_some(partner)
    }

    /// Bounding volumes of every placed portal except `excluded`.
    pub fn placed_bounds_except(&self, excluded: PortalHandle) -> Vec<OrientedBox> {
        self.world
            .query::<&Portal>()
            .iter()
            .filter(|(entity, portal)| *entity != excluded.0 && portal.is_placed())
            .map(|(_, portal)| portal.bounding_volume())
            .collect()
    }
}
