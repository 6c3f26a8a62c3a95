//! Pairwise repulsion pass used by layout optimisation.

use locus_coherence::geometry::pairwise_separation;
use locus_core::{ReferenceId, SpatialMap, SpatialVector};

/// New positions pushing apart every pair closer than `min_distance`,
/// half the shortfall each. Repeated passes converge. `None` if
/// `cancelled` fires between comparisons.
pub(crate) fn repulsion_moves(
    map: &SpatialMap,
    min_distance: f64,
    cancelled: &dyn Fn() -> bool,
) -> Option<Vec<(ReferenceId, SpatialVector)>> {
    pairwise_separation(
        map,
        |_, _, distance| (distance < min_distance).then_some(min_distance),
        cancelled,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_core::{ComplexityLevel, MapContext, ReferenceDraft, ReferenceType, Timestamp};

    fn map_of(xs: &[(&str, f64)]) -> SpatialMap {
        let mut map = SpatialMap::new(MapContext::new("t", "s", ComplexityLevel::Basic));
        for &(id, x) in xs {
            let r = ReferenceDraft::new(ReferenceType::Object, SpatialVector::new(x, 0.0, 0.0))
                .with_id(id)
                .into_reference(Timestamp::now());
            map.insert_reference(r).unwrap();
        }
        map
    }

    #[test]
    fn close_pair_is_pushed_to_min_distance() {
        let map = map_of(&[("a", 0.0), ("b", 0.1), ("c", 5.0)]);
        let moves = repulsion_moves(&map, 0.3, &|| false).unwrap();
        assert_eq!(moves.len(), 2);
        let (a_id, a) = &moves[0];
        let (_, b) = &moves[1];
        assert_eq!(a_id, &ReferenceId::new("a"));
        assert!((a.x + 0.1).abs() < 1e-12);
        assert!((b.x - 0.2).abs() < 1e-12);
    }

    #[test]
    fn spaced_map_does_not_move() {
        let map = map_of(&[("a", 0.0), ("b", 1.0)]);
        assert!(repulsion_moves(&map, 0.3, &|| false).unwrap().is_empty());
    }

    #[test]
    fn cancellation_aborts() {
        let map = map_of(&[("a", 0.0), ("b", 0.1)]);
        assert!(repulsion_moves(&map, 0.3, &|| true).is_none());
    }
}
