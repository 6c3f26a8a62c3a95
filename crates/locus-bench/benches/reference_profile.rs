//! Criterion benchmarks for manager queries on the reference profile.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use locus_bench::{reference_profile, stress_profile};
use locus_core::{ReferenceId, ReferencePatch, SpatialVector};

fn bench_proximity_cached(c: &mut Criterion) {
    let p = reference_profile(42).unwrap();
    let center = SpatialVector::new(0.5, 0.0, 0.5);

    // Warm up: the first call populates the cache
    p.manager
        .find_references_near_position(&p.map_id, center, 1.0, None)
        .unwrap();

    c.bench_function("proximity_cached_200", |b| {
        b.iter(|| {
            let found = p
                .manager
                .find_references_near_position(&p.map_id, black_box(center), 1.0, None)
                .unwrap();
            black_box(&found);
        });
    });
}

fn bench_proximity_after_mutation(c: &mut Criterion) {
    let p = reference_profile(42).unwrap();
    let moved = ReferenceId::new("b0");
    let mut x = 0.0;

    c.bench_function("proximity_after_mutation_200", |b| {
        b.iter(|| {
            x += 1e-6;
            p.manager
                .update_reference(&p.map_id, &moved, ReferencePatch::position(SpatialVector::new(x, 0.0, 0.0)))
                .unwrap();
            let found = p
                .manager
                .find_references_near_position(&p.map_id, SpatialVector::ZERO, 1.0, None)
                .unwrap();
            black_box(&found);
        });
    });
}

fn bench_coherence_2k(c: &mut Criterion) {
    let p = stress_profile(42).unwrap();
    let map = p.manager.get_spatial_map(&p.map_id).unwrap();
    let validator = p.manager.validator();

    c.bench_function("validate_coherence_2k", |b| {
        b.iter(|| {
            let report = validator.validate_spatial_map(&map);
            black_box(&report);
        });
    });
}

criterion_group!(
    benches,
    bench_proximity_cached,
    bench_proximity_after_mutation,
    bench_coherence_2k
);
criterion_main!(benches);
