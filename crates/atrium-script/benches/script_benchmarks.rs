//! Signal-fire throughput -- the hot path of the tick pipeline's
//! pre-physics/post-physics/Touched dispatch (§4.4).

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use parking_lot::RwLock;

use atrium_script::prelude::{ScriptConfig, ScriptHost};
use atrium_tree::prelude::SceneTree;

fn bench_pre_physics_fire(c: &mut Criterion) {
    let tree = Arc::new(RwLock::new(SceneTree::new()));
    let host = ScriptHost::new(tree, ScriptConfig::default(), "bench-blueprint".to_owned(), 8, None).unwrap();
    host.load_main(
        r#"
        local RunService = get_service("RunService")
        _G.count = 0
        RunService:Connect("PrePhysics", function() _G.count = _G.count + 1 end)
        "#,
        "main",
    )
    .unwrap();

    c.bench_function("script_pre_physics_fire", |b| {
        b.iter(|| black_box(host.fire_pre_physics()));
    });
}

criterion_group!(benches, bench_pre_physics_fire);
criterion_main!(benches);
