// src/engine_lib/portal.rs

use std::fmt;

use glam::{Quat, UVec2, Vec2, Vec3};
use log::debug;

use crate::engine_lib::config::PortalConfig;
use crate::engine_lib::registry::PortalHandle;
use crate::engine_lib::transform::{rotation_looking_to, OrientedBox, Transform};

/// Half thickness of a portal's bounding volume.
pub const PORTAL_HALF_DEPTH: f32 = 0.05;
/// How far a contact point may sit off its surface plane.
const SURFACE_PLANE_TOLERANCE: f32 = 0.01;
const OVERHANG_EPSILON: f32 = 1e-4;

/// Boundary probes in portal-local units (multiplied by the half extents).
/// Edge midpoints first, then corners.
const PLACEMENT_PROBES: [Vec2; 8] = [
    Vec2::new(-1.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(0.0, -1.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(-1.0, -1.0),
    Vec2::new(1.0, -1.0),
    Vec2::new(-1.0, 1.0),
    Vec2::new(1.0, 1.0),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortalState {
    Unplaced,
    Placed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GrowthPhase {
    Idle,
    Growing,
    Complete,
}

/// Linear reveal ramp from 0 to `max_radius` over `duration` seconds of
/// frame time.
#[derive(Clone, Debug, PartialEq)]
pub struct GrowthTimeline {
    elapsed: f32,
    duration: f32,
    max_radius: f32,
    phase: GrowthPhase,
}

impl GrowthTimeline {
    pub fn new(duration: f32, max_radius: f32) -> Self {
        Self {
            elapsed: 0.0,
            duration: duration.max(0.0),
            max_radius: max_radius.max(0.0),
            phase: GrowthPhase::Idle,
        }
    }

    pub fn restart(&mut self) {
        self.elapsed = 0.0;
        self.phase = if self.duration > 0.0 { GrowthPhase::Growing } else { GrowthPhase::Complete };
    }

    /// Advances by one frame's delta. Returns true while still growing.
    pub fn advance(&mut self, dt: f32) -> bool {
        if self.phase != GrowthPhase::Growing {
            return false;
        }
        self.elapsed += dt.max(0.0);
        if self.elapsed >= self.duration {
            self.elapsed = self.duration;
            self.phase = GrowthPhase::Complete;
        }
        self.phase == GrowthPhase::Growing
    }

    pub fn radius(&self) -> f32 {
        match self.phase {
            GrowthPhase::Idle => 0.0,
            GrowthPhase::Complete => self.max_radius,
            GrowthPhase::Growing => {
                let t = (self.elapsed / self.duration).min(1.0);
                (self.max_radius * t).min(self.max_radius)
            }
        }
    }

    pub fn max_radius(&self) -> f32 {
        self.max_radius
    }

    pub fn is_growing(&self) -> bool {
        self.phase == GrowthPhase::Growing
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferFormat {
    Rgba8,
}

impl BufferFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba8 => 4,
        }
    }
}

/// Descriptor of a portal's colour target. Backends own the pixel storage
/// and recreate it whenever `generation` changes.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputBuffer {
    pub size: UVec2,
    pub format: BufferFormat,
    pub generation: u32,
    last_written_frame: Option<u64>,
}

impl OutputBuffer {
    fn allocate(size: UVec2, generation: u32) -> Self {
        Self {
            size: size.max(UVec2::ONE),
            format: BufferFormat::Rgba8,
            generation,
            last_written_frame: None,
        }
    }

    pub fn matches(&self, viewport: UVec2) -> bool {
        self.size == viewport.max(UVec2::ONE)
    }

    pub fn byte_len(&self) -> u64 {
        self.size.x as u64 * self.size.y as u64 * self.format.bytes_per_pixel() as u64
    }

    pub fn mark_written(&mut self, frame: u64) {
        self.last_written_frame = Some(frame);
    }

    pub fn last_written_frame(&self) -> Option<u64> {
        self.last_written_frame
    }

    pub fn is_fresh(&self, frame: u64) -> bool {
        self.last_written_frame == Some(frame)
    }
}

/// A rectangular placement target, such as a wall.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementSurface {
    pub center: Vec3,
    /// Points out of the surface, towards the side portals are seen from.
    pub normal: Vec3,
    pub up: Vec3,
    pub half_extents: Vec2,
    pub eligible: bool,
}

impl PlacementSurface {
    pub fn new(center: Vec3, normal: Vec3, up: Vec3, half_extents: Vec2) -> Self {
        let normal = normal.normalize_or_zero();
        // keep up inside the surface plane
        let up = (up - normal * up.dot(normal)).normalize_or_zero();
        Self { center, normal, up, half_extents, eligible: true }
    }

    pub fn ineligible(mut self) -> Self {
        self.eligible = false;
        self
    }

    pub fn right(&self) -> Vec3 {
        self.up.cross(self.normal).normalize_or_zero()
    }

    /// Position of `point` projected onto the surface, in surface units.
    pub fn surface_coords(&self, point: Vec3) -> Vec2 {
        let offset = point - self.center;
        Vec2::new(offset.dot(self.right()), offset.dot(self.up))
    }

    pub fn contains(&self, coords: Vec2) -> bool {
        coords.abs().cmple(self.half_extents + Vec2::splat(OVERHANG_EPSILON)).all()
    }

    pub fn distance_to_plane(&self, point: Vec3) -> f32 {
        (point - self.center).dot(self.normal)
    }

    /// Hit point of a ray travelling towards the visible face.
    pub fn raycast(&self, origin: Vec3, direction: Vec3) -> Option<(f32, Vec3)> {
        let facing = direction.dot(self.normal);
        if facing >= -1e-6 {
            return None;
        }
        let t = (self.center - origin).dot(self.normal) / facing;
        if t <= 0.0 {
            return None;
        }
        let point = origin + direction * t;
        self.contains(self.surface_coords(point)).then_some((t, point))
    }
}

/// Where a placement ray met a surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceContact {
    pub point: Vec3,
    pub surface: PlacementSurface,
}

impl SurfaceContact {
    pub fn normal(&self) -> Vec3 {
        self.surface.normal
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlacementError {
    IneligibleSurface,
    ContactOutOfBounds { distance_to_plane: f32, coords: Vec2 },
    Overhang { overhang: Vec2 },
    Overlap,
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IneligibleSurface => write!(f, "surface does not accept portals"),
            Self::ContactOutOfBounds { distance_to_plane, coords } => write!(
                f,
                "contact point lies off the surface (plane distance {distance_to_plane:.4}, surface coords {coords})"
            ),
            Self::Overhang { overhang } => {
                write!(f, "portal does not fit on the surface (overhang {overhang})")
            }
            Self::Overlap => write!(f, "portal would overlap another portal"),
        }
    }
}

impl std::error::Error for PlacementError {}

#[derive(Debug)]
pub struct Portal {
    pub name: String,
    pub color: [f32; 4],
    transform: Transform,
    partner: Option<PortalHandle>,
    state: PortalState,
    growth: GrowthTimeline,
    output: Option<OutputBuffer>,
    next_generation: u32,
    half_extents: Vec2,
    surface_offset: f32,
}

impl Portal {
    pub fn new(name: impl Into<String>, config: &PortalConfig) -> Self {
        Self {
            name: name.into(),
            color: [1.0, 1.0, 1.0, 1.0],
            transform: Transform::IDENTITY,
            partner: None,
            state: PortalState::Unplaced,
            growth: GrowthTimeline::new(config.growth_duration_s, config.max_radius),
            output: None,
            next_generation: 0,
            half_extents: Vec2::new(config.half_width, config.half_height),
            surface_offset: config.surface_offset,
        }
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn state(&self) -> PortalState {
        self.state
    }

    pub fn is_placed(&self) -> bool {
        self.state == PortalState::Placed
    }

    pub fn partner(&self) -> Option<PortalHandle> {
        self.partner
    }

    pub fn set_partner(&mut self, partner: Option<PortalHandle>) {
        self.partner = partner;
    }

    pub fn growth_radius(&self) -> f32 {
        self.growth.radius()
    }

    pub fn growth(&self) -> &GrowthTimeline {
        &self.growth
    }

    pub fn advance_growth(&mut self, dt: f32) -> bool {
        self.growth.advance(dt)
    }

    pub fn half_extents(&self) -> Vec2 {
        self.half_extents
    }

    pub fn output(&self) -> Option<&OutputBuffer> {
        self.output.as_ref()
    }

    pub fn output_mut(&mut self) -> Option<&mut OutputBuffer> {
        self.output.as_mut()
    }

    pub fn bounding_volume(&self) -> OrientedBox {
        bounding_volume_at(&self.transform, self.half_extents)
    }

    /// Makes sure the output buffer matches `viewport`. A mismatched buffer is
    /// replaced, never resized in place. Returns true if a new buffer was
    /// allocated.
    pub fn ensure_output(&mut self, viewport: UVec2) -> bool {
        if self.output.as_ref().is_some_and(|buffer| buffer.matches(viewport)) {
            return false;
        }
        self.next_generation = self.next_generation.wrapping_add(1);
        self.output = Some(OutputBuffer::allocate(viewport, self.next_generation));
        debug!("portal '{}' output buffer allocated at {}x{}", self.name, viewport.x, viewport.y);
        true
    }

    /// Validates and commits a placement against `contact`'s surface.
    ///
    /// Nothing is mutated unless the placement succeeds.
    pub fn place(
        &mut self,
        contact: &SurfaceContact,
        desired_rotation: Quat,
        obstructions: &[OrientedBox],
        viewport: UVec2,
    ) -> Result<(), PlacementError> {
        let transform = self.resolve_placement(contact, desired_rotation, obstructions)?;

        self.transform = transform;
        self.state = PortalState::Placed;
        self.ensure_output(viewport);
        self.growth.restart();
        debug!("portal '{}' placed at {:?}", self.name, transform.position);
        Ok(())
    }

    fn resolve_placement(
        &self,
        contact: &SurfaceContact,
        desired_rotation: Quat,
        obstructions: &[OrientedBox],
    ) -> Result<Transform, PlacementError> {
        let surface = &contact.surface;
        if !surface.eligible {
            return Err(PlacementError::IneligibleSurface);
        }

        let distance_to_plane = surface.distance_to_plane(contact.point);
        let coords = surface.surface_coords(contact.point);
        if distance_to_plane.abs() > SURFACE_PLANE_TOLERANCE || !surface.contains(coords) {
            return Err(PlacementError::ContactOutOfBounds { distance_to_plane, coords });
        }

        // portal forward points into the surface
        let forward = -surface.normal;
        let mut up = desired_rotation * Vec3::Y;
        up -= forward * up.dot(forward);
        if up.length_squared() < 1e-6 {
            up = surface.up;
        }
        let rotation = rotation_looking_to(forward, up);

        let center = fix_overhangs(surface, coords, rotation, self.half_extents)?;
        let on_surface = surface.center + surface.right() * center.x + surface.up * center.y;
        let position = on_surface - forward * self.surface_offset;

        let transform = Transform { position, rotation, scale: self.transform.scale };
        let bounds = bounding_volume_at(&transform, self.half_extents);
        if obstructions.iter().any(|obstruction| obstruction.intersects(&bounds)) {
            return Err(PlacementError::Overlap);
        }
        Ok(transform)
    }
}

fn bounding_volume_at(transform: &Transform, half_extents: Vec2) -> OrientedBox {
    let half = Vec3::new(half_extents.x, half_extents.y, PORTAL_HALF_DEPTH) * transform.scale.abs();
    OrientedBox::new(transform.position, half, transform.rotation)
}

/// Pulls the portal centre inward until every boundary probe lies on the
/// surface. Fails when the portal is larger than the surface.
fn fix_overhangs(
    surface: &PlacementSurface,
    center: Vec2,
    rotation: Quat,
    half_extents: Vec2,
) -> Result<Vec2, PlacementError> {
    let right = rotation * Vec3::X;
    let up = rotation * Vec3::Y;
    let offsets: Vec<Vec2> = PLACEMENT_PROBES
        .iter()
        .map(|probe| {
            let world = right * probe.x * half_extents.x + up * probe.y * half_extents.y;
            Vec2::new(world.dot(surface.right()), world.dot(surface.up))
        })
        .collect();

    let lo = offsets.iter().fold(Vec2::splat(f32::INFINITY), |acc, o| acc.min(*o));
    let hi = offsets.iter().fold(Vec2::splat(f32::NEG_INFINITY), |acc, o| acc.max(*o));

    let span = hi - lo;
    let room = surface.half_extents * 2.0;
    if span.cmpgt(room + Vec2::splat(OVERHANG_EPSILON)).any() {
        return Err(PlacementError::Overhang { overhang: (span - room).max(Vec2::ZERO) });
    }

    let mut clamped = center;
    for axis in 0..2 {
        let max_edge = clamped[axis] + hi[axis];
        let min_edge = clamped[axis] + lo[axis];
        if max_edge > surface.half_extents[axis] {
            clamped[axis] -= max_edge - surface.half_extents[axis];
        } else if min_edge < -surface.half_extents[axis] {
            clamped[axis] += -surface.half_extents[axis] - min_edge;
        }
    }

    if let Some(outside) = offsets.iter().map(|o| clamped + *o).find(|p| !surface.contains(*p)) {
        let overhang = (outside.abs() - surface.half_extents).max(Vec2::ZERO);
        return Err(PlacementError::Overhang { overhang });
    }
    if clamped != center {
        debug!("placement pulled inward from {center} to {clamped}");
    }
    Ok(clamped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PortalConfig {
        PortalConfig { half_width: 0.5, half_height: 1.0, ..PortalConfig::default() }
    }

    /// 4x3 wall in the z = 0 plane, visible from +Z.
    fn wall() -> PlacementSurface {
        PlacementSurface::new(Vec3::new(0.0, 1.5, 0.0), Vec3::Z, Vec3::Y, Vec2::new(2.0, 1.5))
    }

    fn contact(x: f32, y: f32) -> SurfaceContact {
        SurfaceContact { point: Vec3::new(x, y, 0.0), surface: wall() }
    }

    const VIEWPORT: UVec2 = UVec2::new(640, 480);

    #[test]
    fn growth_ramps_linearly_to_max() {
        let mut growth = GrowthTimeline::new(2.0, 1.5);
        assert_eq!(growth.radius(), 0.0);
        assert!(!growth.advance(0.5), "idle timeline must not advance");
        assert_eq!(growth.radius(), 0.0);

        growth.restart();
        let mut last = growth.radius();
        for _ in 0..3 {
            growth.advance(0.5);
            assert!(growth.radius() >= last);
            last = growth.radius();
        }
        assert!((growth.radius() - 1.125).abs() < 1e-5);
        assert!(!growth.advance(10.0));
        assert_eq!(growth.radius(), 1.5);

        growth.restart();
        assert_eq!(growth.radius(), 0.0);
        assert!(growth.is_growing());
    }

    #[test]
    fn growth_ignores_negative_deltas() {
        let mut growth = GrowthTimeline::new(1.0, 1.0);
        growth.restart();
        growth.advance(0.25);
        growth.advance(-5.0);
        assert!((growth.radius() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn zero_duration_growth_completes_immediately() {
        let mut growth = GrowthTimeline::new(0.0, 2.0);
        growth.restart();
        assert_eq!(growth.radius(), 2.0);
    }

    #[test]
    fn valid_placement_commits_everything() {
        let mut portal = Portal::new("blue", &config());
        portal.place(&contact(0.0, 1.5), Quat::IDENTITY, &[], VIEWPORT).unwrap();

        assert_eq!(portal.state(), PortalState::Placed);
        let t = portal.transform();
        assert!(t.forward().abs_diff_eq(Vec3::NEG_Z, 1e-5));
        assert!(t.up().abs_diff_eq(Vec3::Y, 1e-5));
        // offset off the wall towards the viewer
        assert!(t.position.abs_diff_eq(Vec3::new(0.0, 1.5, 0.001), 1e-6));

        let output = portal.output().unwrap();
        assert_eq!(output.size, VIEWPORT);
        assert_eq!(output.format, BufferFormat::Rgba8);
        assert_eq!(output.last_written_frame(), None);
        assert_eq!(output.byte_len(), 640 * 480 * 4);
        assert!(portal.growth().is_growing());
        assert_eq!(portal.growth_radius(), 0.0);
    }

    #[test]
    fn desired_up_is_projected_onto_the_surface() {
        let mut portal = Portal::new("blue", &config());
        let tilted = Quat::from_rotation_x(0.6) * Quat::from_rotation_z(0.3);
        portal.place(&contact(0.0, 1.5), tilted, &[], VIEWPORT).unwrap();
        let t = portal.transform();
        assert!(t.forward().abs_diff_eq(Vec3::NEG_Z, 1e-5));
        assert!(t.up().z.abs() < 1e-5);
    }

    #[test]
    fn overhanging_placement_is_pulled_inward() {
        let mut portal = Portal::new("blue", &config());
        // 0.2 from the right edge and 0.3 from the top, portal is 0.5 x 1.0 half size
        portal.place(&contact(1.8, 2.7), Quat::IDENTITY, &[], VIEWPORT).unwrap();
        let position = portal.transform().position;
        assert!((position.x - 1.5).abs() < 1e-5, "{position:?}");
        assert!((position.y - 2.0).abs() < 1e-5, "{position:?}");

        portal.place(&contact(-1.9, 0.2), Quat::IDENTITY, &[], VIEWPORT).unwrap();
        let position = portal.transform().position;
        assert!((position.x + 1.5).abs() < 1e-5, "{position:?}");
        assert!((position.y - 1.0).abs() < 1e-5, "{position:?}");
    }

    #[test]
    fn portal_larger_than_surface_is_rejected() {
        let big = PortalConfig { half_width: 2.5, ..config() };
        let mut portal = Portal::new("huge", &big);
        let err = portal.place(&contact(0.0, 1.5), Quat::IDENTITY, &[], VIEWPORT).unwrap_err();
        assert!(matches!(err, PlacementError::Overhang { .. }), "{err}");
    }

    #[test]
    fn rotated_portal_needs_room_for_its_corners() {
        // a portal rolled 90 degrees is 2 wide and 1 tall, still fits on a 4x3 wall
        let mut portal = Portal::new("rolled", &config());
        let rolled = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        portal.place(&contact(1.9, 1.5), rolled, &[], VIEWPORT).unwrap();
        assert!((portal.transform().position.x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn contact_off_the_surface_is_rejected() {
        let mut portal = Portal::new("blue", &config());
        let outside = contact(2.5, 1.5);
        assert!(matches!(
            portal.place(&outside, Quat::IDENTITY, &[], VIEWPORT),
            Err(PlacementError::ContactOutOfBounds { .. })
        ));
        let floating = SurfaceContact { point: Vec3::new(0.0, 1.5, 0.5), surface: wall() };
        assert!(matches!(
            portal.place(&floating, Quat::IDENTITY, &[], VIEWPORT),
            Err(PlacementError::ContactOutOfBounds { .. })
        ));
    }

    #[test]
    fn ineligible_surface_is_rejected() {
        let mut portal = Portal::new("blue", &config());
        let glass = SurfaceContact { point: Vec3::new(0.0, 1.5, 0.0), surface: wall().ineligible() };
        assert_eq!(
            portal.place(&glass, Quat::IDENTITY, &[], VIEWPORT),
            Err(PlacementError::IneligibleSurface)
        );
    }

    #[test]
    fn overlapping_placement_is_rejected() {
        let mut first = Portal::new("blue", &config());
        first.place(&contact(-0.5, 1.5), Quat::IDENTITY, &[], VIEWPORT).unwrap();
        let mut second = Portal::new("orange", &config());
        let obstructions = [first.bounding_volume()];
        assert_eq!(
            second.place(&contact(0.3, 1.5), Quat::IDENTITY, &obstructions, VIEWPORT),
            Err(PlacementError::Overlap)
        );
        second.place(&contact(1.2, 1.5), Quat::IDENTITY, &obstructions, VIEWPORT).unwrap();
    }

    #[test]
    fn rejected_placement_changes_nothing() {
        let mut portal = Portal::new("blue", &config());
        portal.place(&contact(0.0, 1.5), Quat::IDENTITY, &[], VIEWPORT).unwrap();
        portal.output_mut().unwrap().mark_written(3);
        portal.advance_growth(0.5);

        let before = (portal.state(), portal.transform(), portal.output().cloned(), portal.growth().clone());
        for _ in 0..2 {
            assert!(portal.place(&contact(9.0, 9.0), Quat::IDENTITY, &[], UVec2::new(10, 10)).is_err());
            let after = (portal.state(), portal.transform(), portal.output().cloned(), portal.growth().clone());
            assert_eq!(before, after);
        }

        let mut unplaced = Portal::new("orange", &config());
        for _ in 0..2 {
            assert!(unplaced.place(&contact(9.0, 9.0), Quat::IDENTITY, &[], VIEWPORT).is_err());
            assert_eq!(unplaced.state(), PortalState::Unplaced);
            assert_eq!(unplaced.transform(), Transform::IDENTITY);
            assert!(unplaced.output().is_none());
        }
    }

    #[test]
    fn output_is_replaced_on_resolution_change() {
        let mut portal = Portal::new("blue", &config());
        assert!(portal.ensure_output(VIEWPORT));
        let first_generation = portal.output().unwrap().generation;
        portal.output_mut().unwrap().mark_written(1);

        assert!(!portal.ensure_output(VIEWPORT));
        assert!(portal.output().unwrap().is_fresh(1));

        assert!(portal.ensure_output(UVec2::new(800, 600)));
        let output = portal.output().unwrap();
        assert_eq!(output.size, UVec2::new(800, 600));
        assert_ne!(output.generation, first_generation);
        assert_eq!(output.last_written_frame(), None);
    }

    #[test]
    fn raycast_hits_visible_face_only() {
        let surface = wall();
        let (t, point) = surface.raycast(Vec3::new(0.5, 1.0, 4.0), Vec3::NEG_Z).unwrap();
        assert!((t - 4.0).abs() < 1e-5);
        assert!(point.abs_diff_eq(Vec3::new(0.5, 1.0, 0.0), 1e-5));
        assert!(surface.raycast(Vec3::new(0.5, 1.0, -4.0), Vec3::Z).is_none());
        assert!(surface.raycast(Vec3::new(5.0, 1.0, 4.0), Vec3::NEG_Z).is_none());
    }
}
