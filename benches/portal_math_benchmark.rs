// benches/portal_math_benchmark.rs
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use glam::{Quat, UVec2, Vec3};
use magic_portal::engine_lib::projector::{oblique_projection, portal_clip_plane};
use magic_portal::engine_lib::solver::solve_depths;
use magic_portal::engine_lib::transform::OrientedBox;
use magic_portal::{Transform, ViewerState};
use rand::Rng;

const NUM_BENCH_POSES: usize = 100;

fn random_pose(rng: &mut impl Rng) -> Transform {
    let position = Vec3::new(rng.gen_range(-10.0..10.0), rng.gen_range(0.0..3.0), rng.gen_range(-10.0..10.0));
    let rotation = Quat::from_rotation_y(rng.gen_range(-3.1..3.1)) * Quat::from_rotation_x(rng.gen_range(-0.5..0.5));
    Transform::new(position, rotation)
}

fn create_pose_set(rng: &mut impl Rng) -> Vec<(Transform, Transform, Transform)> {
    (0..NUM_BENCH_POSES)
        .map(|_| (random_pose(rng), random_pose(rng), random_pose(rng)))
        .collect()
}

fn portal_math_benchmark_fn(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let poses = create_pose_set(&mut rng);

    let mut group = c.benchmark_group("PortalMath");

    group.bench_function("solve_depths_7_over_100_poses", |b| {
        let mut pose_iter = poses.iter().cycle();
        b.iter(|| {
            if let Some((entry, exit, viewer)) = pose_iter.next() {
                black_box(solve_depths(black_box(entry), black_box(exit), black_box(viewer), 7));
            }
        })
    });

    group.bench_function("oblique_projection_over_100_poses", |b| {
        let mut pose_iter = poses.iter().cycle();
        b.iter(|| {
            if let Some((_, exit, viewer)) = pose_iter.next() {
                let state = ViewerState::new(*viewer, 75.0, 0.1, 100.0, UVec2::new(1280, 720));
                let plane = portal_clip_plane(exit);
                black_box(oblique_projection(state.base_projection(), state.world_to_camera(), black_box(&plane)));
            }
        })
    });

    group.bench_function("frustum_intersects_obb_over_100_poses", |b| {
        let boxes: Vec<OrientedBox> = poses
            .iter()
            .map(|(entry, _, _)| OrientedBox::new(entry.position, Vec3::new(1.0, 1.5, 0.05), entry.rotation))
            .collect();
        let mut pair_iter = poses.iter().zip(boxes.iter()).cycle();
        b.iter(|| {
            if let Some(((_, _, viewer), bounds)) = pair_iter.next() {
                let frustum = ViewerState::new(*viewer, 75.0, 0.1, 100.0, UVec2::new(1280, 720)).frustum();
                black_box(frustum.intersects_obb(black_box(bounds)));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, portal_math_benchmark_fn);
criterion_main!(benches);
