// src/demo_scene.rs

use glam::{Vec2, Vec3};

use magic_portal::engine_lib::portal::{PlacementSurface, SurfaceContact};
use magic_portal::rendering_lib::SceneVertex;

const ROOM_HALF_WIDTH: f32 = 6.0;
const ROOM_HALF_DEPTH: f32 = 6.0;
const ROOM_HEIGHT: f32 = 3.0;

const CEILING_COLOR: [f32; 4] = [0.6, 0.2, 0.2, 1.0];
const FLOOR_COLOR: [f32; 4] = [0.2, 0.5, 0.2, 1.0];
const LEFT_WALL_COLOR: [f32; 4] = [0.9, 0.9, 0.9, 1.0];
const RIGHT_WALL_COLOR: [f32; 4] = [0.5, 0.5, 0.5, 1.0];
const FRONT_WALL_COLOR: [f32; 4] = [0.3, 0.3, 0.8, 1.0];
const BACK_WALL_COLOR: [f32; 4] = [0.8, 0.8, 0.3, 1.0];
const PILLAR_COLOR: [f32; 4] = [0.9, 0.5, 0.2, 1.0];
const CRATE_COLOR: [f32; 4] = [0.45, 0.3, 0.2, 1.0];

pub const PORTAL_COLORS: [[f32; 4]; 2] = [[0.2, 0.5, 1.0, 1.0], [1.0, 0.55, 0.1, 1.0]];
pub const INITIAL_VIEWER_POSITION: Vec3 = Vec3::new(0.0, 1.6, 2.0);
pub const INITIAL_VIEWER_YAW: f32 = 0.0;

/// Room geometry plus the surfaces portals may be placed on.
pub struct DemoRoom {
    pub surfaces: Vec<PlacementSurface>,
    pub vertices: Vec<SceneVertex>,
    pub indices: Vec<u32>,
}

impl DemoRoom {
    /// Nearest placement surface hit by the ray, eligible or not.
    pub fn pick(&self, origin: Vec3, direction: Vec3) -> Option<SurfaceContact> {
        self.surfaces
            .iter()
            .filter_map(|surface| surface.raycast(origin, direction).map(|(t, point)| (t, point, *surface)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, point, surface)| SurfaceContact { point, surface })
    }

    /// Where the demo pair starts: facing each other across the room.
    pub fn initial_contacts(&self) -> [SurfaceContact; 2] {
        let front = self.surfaces[0];
        let back = self.surfaces[1];
        [
            SurfaceContact { point: front.center, surface: front },
            SurfaceContact { point: back.center, surface: back },
        ]
    }

    fn push_surface(&mut self, surface: PlacementSurface, color: [f32; 4]) {
        let right = surface.right() * surface.half_extents.x;
        let up = surface.up * surface.half_extents.y;
        let c = surface.center;
        push_quad(&mut self.vertices, &mut self.indices, [c - right - up, c + right - up, c + right + up, c - right + up], color);
        self.surfaces.push(surface);
    }

    fn push_box(&mut self, center: Vec3, half: Vec3, color: [f32; 4]) {
        let (x, y, z) = (Vec3::X * half.x, Vec3::Y * half.y, Vec3::Z * half.z);
        let c = center;
        let faces = [
            [c - x - y + z, c + x - y + z, c + x + y + z, c - x + y + z],
            [c + x - y - z, c - x - y - z, c - x + y - z, c + x + y - z],
            [c - x - y - z, c - x - y + z, c - x + y + z, c - x + y - z],
            [c + x - y + z, c + x - y - z, c + x + y - z, c + x + y + z],
            [c - x + y + z, c + x + y + z, c + x + y - z, c - x + y - z],
            [c - x - y - z, c + x - y - z, c + x - y + z, c - x - y + z],
        ];
        for (i, face) in faces.into_iter().enumerate() {
            // shade faces apart so edges read
            let shade = 1.0 - 0.08 * i as f32;
            let tinted = [color[0] * shade, color[1] * shade, color[2] * shade, color[3]];
            push_quad(&mut self.vertices, &mut self.indices, face, tinted);
        }
    }
}

fn push_quad(vertices: &mut Vec<SceneVertex>, indices: &mut Vec<u32>, corners: [Vec3; 4], color: [f32; 4]) {
    let start = vertices.len() as u32;
    vertices.extend(corners.iter().map(|p| SceneVertex::new(p.to_array(), color)));
    indices.extend_from_slice(&[start, start + 1, start + 2, start, start + 2, start + 3]);
}

pub fn create_demo_room() -> DemoRoom {
    let mut room = DemoRoom { surfaces: Vec::new(), vertices: Vec::new(), indices: Vec::new() };
    let mid = ROOM_HEIGHT / 2.0;
    let wall_extent = |half_width: f32| Vec2::new(half_width, mid);

    // walls: normals point into the room
    room.push_surface(
        PlacementSurface::new(Vec3::new(0.0, mid, -ROOM_HALF_DEPTH), Vec3::Z, Vec3::Y, wall_extent(ROOM_HALF_WIDTH)),
        FRONT_WALL_COLOR,
    );
    room.push_surface(
        PlacementSurface::new(Vec3::new(0.0, mid, ROOM_HALF_DEPTH), Vec3::NEG_Z, Vec3::Y, wall_extent(ROOM_HALF_WIDTH)),
        BACK_WALL_COLOR,
    );
    room.push_surface(
        PlacementSurface::new(Vec3::new(-ROOM_HALF_WIDTH, mid, 0.0), Vec3::X, Vec3::Y, wall_extent(ROOM_HALF_DEPTH)),
        LEFT_WALL_COLOR,
    );
    room.push_surface(
        PlacementSurface::new(Vec3::new(ROOM_HALF_WIDTH, mid, 0.0), Vec3::NEG_X, Vec3::Y, wall_extent(ROOM_HALF_DEPTH)),
        RIGHT_WALL_COLOR,
    );
    // floor and ceiling take no portals
    let flat_extent = Vec2::new(ROOM_HALF_WIDTH, ROOM_HALF_DEPTH);
    room.push_surface(PlacementSurface::new(Vec3::ZERO, Vec3::Y, Vec3::NEG_Z, flat_extent).ineligible(), FLOOR_COLOR);
    room.push_surface(
        PlacementSurface::new(Vec3::new(0.0, ROOM_HEIGHT, 0.0), Vec3::NEG_Y, Vec3::Z, flat_extent).ineligible(),
        CEILING_COLOR,
    );

    room.push_box(Vec3::new(-3.0, mid, -2.0), Vec3::new(0.4, mid, 0.4), PILLAR_COLOR);
    room.push_box(Vec3::new(3.0, mid, 2.5), Vec3::new(0.4, mid, 0.4), PILLAR_COLOR);
    room.push_box(Vec3::new(1.5, 0.5, -3.5), Vec3::splat(0.5), CRATE_COLOR);
    room.push_box(Vec3::new(-2.0, 0.35, 3.5), Vec3::new(0.7, 0.35, 0.5), CRATE_COLOR);

    room
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_mesh_is_consistent() {
        let room = create_demo_room();
        assert_eq!(room.indices.len() % 3, 0);
        assert!(room.indices.iter().all(|i| (*i as usize) < room.vertices.len()));
        assert_eq!(room.surfaces.iter().filter(|s| s.eligible).count(), 4);
    }

    #[test]
    fn pick_finds_the_wall_in_front() {
        let room = create_demo_room();
        let contact = room.pick(INITIAL_VIEWER_POSITION, Vec3::NEG_Z).unwrap();
        assert!((contact.point.z + ROOM_HALF_DEPTH).abs() < 1e-4);
        assert!(contact.surface.eligible);

        let floor = room.pick(INITIAL_VIEWER_POSITION, Vec3::NEG_Y).unwrap();
        assert!(!floor.surface.eligible);
    }
}
