//! Blueprint load throughput -- the hot path of `find_or_create_instance`'s
//! first access to a blueprint (every access after is a cache hit).

use std::fs;
use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use atrium_blueprint::prelude::BlueprintCache;

fn setup_blueprint(root: &std::path::Path, blueprint_id: &str) {
    let dir = root.join(blueprint_id);
    fs::create_dir_all(dir.join("assets").join("models")).unwrap();
    fs::write(
        dir.join("world.toml"),
        "name = \"Arena\"\nmax_players = 8\n\n[scripts]\nmain = \"main.luau\"\n",
    )
    .unwrap();
    fs::write(dir.join("main.luau"), "-- entry script\n".repeat(100)).unwrap();
    fs::write(dir.join("assets").join("models").join("tree.glb"), b"glb").unwrap();
}

fn bench_cold_load(c: &mut Criterion) {
    let root: PathBuf = std::env::temp_dir().join(format!("atrium-blueprint-bench-{}", std::process::id()));
    setup_blueprint(&root, "arena");

    c.bench_function("blueprint_cold_load", |b| {
        b.iter(|| {
            let cache = BlueprintCache::new(&root);
            black_box(cache.get_or_load("arena").unwrap());
        });
    });

    fs::remove_dir_all(&root).ok();
}

criterion_group!(benches, bench_cold_load);
criterion_main!(benches);
