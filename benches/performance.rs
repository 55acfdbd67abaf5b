//! Performance benchmarks for the state store.

use cashflow_store::{Cache, Store, StoreConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

fn deep_path(depth: usize) -> String {
    (0..depth).map(|i| format!("level{}", i)).collect::<Vec<_>>().join(".")
}

/// Writes with a growing number of listeners on the path and its ancestors.
fn bench_set_with_listeners(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_with_listeners");

    for listeners in [0, 10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("listeners", listeners),
            &listeners,
            |b, &count| {
                let store = Store::new(StoreConfig::default());
                let subs: Vec<_> = (0..count)
                    .map(|i| {
                        let path = if i % 2 == 0 { "data" } else { "data.gastos" };
                        store.subscribe(path, |v, _| {
                            black_box(v);
                        })
                    })
                    .collect();

                b.iter(|| {
                    store
                        .set_state("data.gastos", black_box(json!([{"id": "a", "amount": 1}])))
                        .unwrap();
                });
                drop(subs);
            },
        );
    }

    group.finish();
}

/// Reads and writes at increasing depth.
fn bench_deep_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_paths");

    for depth in [1, 4, 16, 64] {
        let path = deep_path(depth);

        group.bench_with_input(BenchmarkId::new("set", depth), &path, |b, path| {
            let store = Store::new(StoreConfig::default());
            b.iter(|| store.set_state(black_box(path), json!(42)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("get", depth), &path, |b, path| {
            let store = Store::new(StoreConfig::default());
            store.set_state(path, json!(42)).unwrap();
            b.iter(|| black_box(store.get_state(black_box(path)).unwrap()));
        });
    }

    group.finish();
}

/// Identity invalidation over a full cache.
fn bench_cache_invalidation(c: &mut Criterion) {
    c.bench_function("cache_invalidate_identity", |b| {
        b.iter_batched(
            || {
                let cache = Cache::new(256);
                for i in 0..256 {
                    let kind = format!("kind{}", i / 16);
                    cache.set(Cache::key_for(&kind, &(i % 16).to_string()), json!(i));
                }
                cache
            },
            |cache| black_box(cache.invalidate_identity("7")),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_set_with_listeners,
    bench_deep_paths,
    bench_cache_invalidation
);
criterion_main!(benches);
