//! Property and scenario tests for the coherence validator.

use locus_coherence::{calculate_distance, CoherenceValidator};
use locus_core::{
    ComplexityLevel, IssueKind, MapContext, ReferenceDraft, ReferenceType, SpatialMap,
    SpatialVector, Timestamp,
};
use proptest::prelude::*;

fn empty_map() -> SpatialMap {
    SpatialMap::new(MapContext::new("scenario", "session-1", ComplexityLevel::Intermediate))
}

fn add(map: &mut SpatialMap, id: &str, position: SpatialVector) {
    let r = ReferenceDraft::new(ReferenceType::Person, position)
        .with_id(id)
        .into_reference(Timestamp::now());
    map.insert_reference(r).unwrap();
}

fn coord() -> impl Strategy<Value = f64> {
    -50.0f64..50.0
}

fn vector() -> impl Strategy<Value = SpatialVector> {
    (coord(), coord(), coord()).prop_map(|(x, y, z)| SpatialVector::new(x, y, z))
}

proptest! {
    #[test]
    fn distance_is_reflexive(p in vector()) {
        prop_assert_eq!(calculate_distance(p, p), 0.0);
    }

    #[test]
    fn distance_is_symmetric(a in vector(), b in vector()) {
        prop_assert_eq!(calculate_distance(a, b), calculate_distance(b, a));
    }

    #[test]
    fn overlapping_addition_lowers_score(
        spread in proptest::collection::vec(vector(), 1..6),
        pick in any::<prop::sample::Index>(),
        offset in -0.1f64..0.1,
    ) {
        let validator = CoherenceValidator::default();
        let mut map = empty_map();
        for (i, p) in spread.iter().enumerate() {
            add(&mut map, &format!("r{i}"), *p);
        }
        let before = validator.validate_spatial_map(&map);
        prop_assume!(before.is_coherent);

        let anchor = spread[pick.index(spread.len())];
        add(&mut map, "intruder", anchor + SpatialVector::new(offset, 0.0, 0.0));
        let after = validator.validate_spatial_map(&map);
        prop_assert!(!after.is_coherent);
        prop_assert!(after.score < before.score);
    }

    #[test]
    fn corrections_leave_input_alone(points in proptest::collection::vec(vector(), 2..8)) {
        let validator = CoherenceValidator::default();
        let mut map = empty_map();
        for (i, p) in points.iter().enumerate() {
            add(&mut map, &format!("r{i}"), *p);
        }
        let snapshot = map.clone();
        let _ = validator.suggest_coherence_corrections(&map);
        prop_assert_eq!(map, snapshot);
    }
}

#[test]
fn near_pair_scenario() {
    let validator = CoherenceValidator::default();
    let mut map = empty_map();
    add(&mut map, "R1", SpatialVector::ZERO);
    add(&mut map, "R2", SpatialVector::new(0.05, 0.0, 0.0));

    let report = validator.validate_spatial_map(&map);
    assert!(report.count_kind(IssueKind::Distance) >= 1);
    // 0.05 is also inside the default overlap distance of 0.15.
    assert_eq!(report.count_kind(IssueKind::Overlap), 1);
    assert!(!report.is_coherent);
    assert!((report.score - 0.75).abs() < 1e-12);
}
