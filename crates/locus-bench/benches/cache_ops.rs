//! Criterion micro-benchmarks for multi-level cache operations.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use locus_cache::{CacheConfig, EvictionPolicy, LevelConfig, MultiLevelCache};

fn single_level(policy: EvictionPolicy) -> MultiLevelCache<u64, u64> {
    let config = CacheConfig::builder()
        .level(LevelConfig::new("l1", 1024, policy))
        .build()
        .unwrap();
    MultiLevelCache::new(config).unwrap()
}

fn bench_get_hit(c: &mut Criterion) {
    let cache = MultiLevelCache::<u64, u64>::new(CacheConfig::default()).unwrap();
    for k in 0..100 {
        cache.set(k, k, "hot").unwrap();
    }
    let mut k = 0;
    c.bench_function("get_hit_default", |b| {
        b.iter(|| {
            k = (k + 1) % 100;
            black_box(cache.get(&k));
        });
    });
}

fn bench_set_evicting(c: &mut Criterion) {
    for (name, policy) in [
        ("set_evicting_lru", EvictionPolicy::Lru),
        ("set_evicting_lfu", EvictionPolicy::Lfu),
        ("set_evicting_fifo", EvictionPolicy::Fifo),
        ("set_evicting_adaptive", EvictionPolicy::adaptive()),
    ] {
        let cache = single_level(policy);
        let mut k = 0u64;
        c.bench_function(name, |b| {
            b.iter(|| {
                k += 1;
                cache.set(k, k, "l1").unwrap();
            });
        });
    }
}

criterion_group!(benches, bench_get_hit, bench_set_evicting);
criterion_main!(benches);
