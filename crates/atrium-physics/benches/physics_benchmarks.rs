//! Step throughput with a moderate part count, the same shape of benchmark
//! the engine keeps for its rapier integration.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use atrium_physics::prelude::PhysicsWorld;
use atrium_tree::prelude::{CFrame, NodeIdAllocator, PartShape, Vec3};

fn bench_step_200_dynamic_parts(c: &mut Criterion) {
    c.bench_function("step_200_dynamic_parts", |b| {
        b.iter(|| {
            let mut ids = NodeIdAllocator::new();
            let mut world = PhysicsWorld::new();
            for i in 0..200 {
                let id = ids.allocate();
                world.add_part(
                    id,
                    PartShape::Ball,
                    Vec3::new(1.0, 1.0, 1.0),
                    CFrame::identity_at(Vec3::new(i as f64, 10.0, 0.0)),
                    false,
                    true,
                    Vec3::ZERO,
                );
            }
            black_box(world.step(1.0 / 60.0).unwrap());
        });
    });
}

criterion_group!(benches, bench_step_200_dynamic_parts);
criterion_main!(benches);
