//! Spawn/despawn throughput for the scene tree, the same shape of benchmark
//! the engine keeps for its entity allocator.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use atrium_tree::prelude::*;

fn bench_spawn_1k_parts(c: &mut Criterion) {
    c.bench_function("spawn_1k_parts_under_workspace", |b| {
        b.iter(|| {
            let mut tree = SceneTree::new();
            let ws = tree.workspace_id();
            for i in 0..1000 {
                let part = PartData::new(
                    PartShape::Box,
                    Vec3::new(4.0, 1.0, 2.0),
                    CFrame::identity_at(Vec3::new(i as f64, 0.0, 0.0)),
                );
                black_box(tree.spawn(ws, "Part", NodeKind::Part(part)).unwrap());
            }
        });
    });
}

fn bench_despawn_1k_parts(c: &mut Criterion) {
    c.bench_function("despawn_1k_parts", |b| {
        b.iter(|| {
            let mut tree = SceneTree::new();
            let ws = tree.workspace_id();
            let ids: Vec<_> = (0..1000)
                .map(|_| {
                    tree.spawn(
                        ws,
                        "Part",
                        NodeKind::Part(PartData::new(
                            PartShape::Box,
                            Vec3::new(1.0, 1.0, 1.0),
                            CFrame::default(),
                        )),
                    )
                    .unwrap()
                })
                .collect();
            for id in ids {
                tree.despawn(id).unwrap();
            }
        });
    });
}

criterion_group!(benches, bench_spawn_1k_parts, bench_despawn_1k_parts);
criterion_main!(benches);
