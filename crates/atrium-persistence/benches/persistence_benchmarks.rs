//! Throughput of synchronous cache writes under concurrent contention --
//! the path gameplay scripts exercise on every `SetAsync`.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use atrium_persistence::prelude::{FileBackend, PersistenceStore};

fn bench_1k_sets(c: &mut Criterion) {
    c.bench_function("persistence_1k_sets", |b| {
        b.iter(|| {
            let dir = std::env::temp_dir().join(format!("atrium-persistence-bench-{}", std::process::id()));
            let store = PersistenceStore::new(FileBackend::new(dir));
            for i in 0..1000 {
                store
                    .set("bench-blueprint", "Inventory", &format!("key-{i}"), serde_json::json!(i))
                    .unwrap();
            }
            black_box(store.get("bench-blueprint", "Inventory", "key-999"));
        });
    });
}

criterion_group!(benches, bench_1k_sets);
criterion_main!(benches);
