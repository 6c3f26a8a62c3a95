//! Criterion benchmarks for the coherence validator on lattice maps.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use locus_coherence::CoherenceValidator;
use locus_core::{SpatialMap, Timestamp};
use locus_test_utils::fixtures::{lattice, object, test_context};

fn lattice_map(n: usize, spacing: f64) -> SpatialMap {
    let mut map = SpatialMap::new(test_context());
    for draft in lattice(n, spacing) {
        map.insert_reference(draft.into_reference(Timestamp::now()))
            .unwrap();
    }
    map
}

fn bench_validate_500(c: &mut Criterion) {
    let map = lattice_map(500, 0.5);
    let validator = CoherenceValidator::default();
    c.bench_function("validate_lattice_500", |b| {
        b.iter(|| black_box(validator.validate_spatial_map(&map)));
    });
}

fn bench_addition_check_500(c: &mut Criterion) {
    let map = lattice_map(500, 0.5);
    let validator = CoherenceValidator::default();
    let candidate = object("candidate", [0.6, 0.6, 0.6]).into_reference(Timestamp::now());
    c.bench_function("addition_check_lattice_500", |b| {
        b.iter(|| black_box(validator.validate_reference_addition(&map, &candidate)));
    });
}

fn bench_corrections_crowded(c: &mut Criterion) {
    let map = lattice_map(125, 0.1);
    let validator = CoherenceValidator::default();
    c.bench_function("correction_moves_crowded_125", |b| {
        b.iter(|| black_box(validator.correction_moves(&map)));
    });
}

criterion_group!(
    benches,
    bench_validate_500,
    bench_addition_check_500,
    bench_corrections_crowded
);
criterion_main!(benches);
