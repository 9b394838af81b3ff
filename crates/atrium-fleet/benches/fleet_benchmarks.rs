//! Admission throughput -- the hot path of `try_join` under repeated calls
//! against a warm blueprint cache.

use std::fs;
use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use atrium_fleet::prelude::Fleet;

fn setup_blueprint(root: &std::path::Path, blueprint_id: &str, max_players: u32) {
    let dir = root.join(blueprint_id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("world.toml"),
        format!("name = \"Arena\"\nmax_players = {max_players}\n\n[scripts]\nmain = \"main.luau\"\n"),
    )
    .unwrap();
    fs::write(dir.join("main.luau"), "-- entry script\n").unwrap();
}

fn bench_try_join(c: &mut Criterion) {
    let root: PathBuf = std::env::temp_dir().join(format!("atrium-fleet-bench-{}", std::process::id()));
    setup_blueprint(&root, "arena", 1_000_000);
    let fleet = Fleet::new(&root, None);

    let mut n = 0u64;
    c.bench_function("fleet_try_join", |b| {
        b.iter(|| {
            n += 1;
            black_box(fleet.try_join("arena", &format!("agent-{n}"), "Agent").unwrap());
        });
    });

    fs::remove_dir_all(&root).ok();
}

criterion_group!(benches, bench_try_join);
criterion_main!(benches);
