//! Geometric primitives shared by the validator and layout passes.

use locus_core::{ReferenceId, SpatialMap, SpatialReference, SpatialSize, SpatialVector};

/// Euclidean distance between two points.
pub fn calculate_distance(p1: SpatialVector, p2: SpatialVector) -> f64 {
    p1.distance_to(p2)
}

/// Mean half-extent of a reference's bounding box, using `default` when
/// the reference carries no size.
pub fn mean_radius(reference: &SpatialReference, default: SpatialSize) -> f64 {
    reference.size.unwrap_or(default).mean_radius()
}

/// Angle in degrees at `vertex` between the rays towards `a` and `b`.
///
/// `None` when `vertex` coincides with either point.
pub fn angle_at(vertex: SpatialVector, a: SpatialVector, b: SpatialVector) -> Option<f64> {
    let u = (a - vertex).normalized()?;
    let v = (b - vertex).normalized()?;
    Some(u.dot(v).clamp(-1.0, 1.0).acos().to_degrees())
}

/// Deterministic unit direction for separating coincident points.
///
/// Successive seeds walk a golden-angle spiral over the sphere, so
/// distinct pairs get well-spread directions without randomness.
pub fn fallback_direction(seed: usize) -> SpatialVector {
    const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;
    const SAMPLES: usize = 64;
    let i = (seed % SAMPLES) as f64;
    let y = 1.0 - 2.0 * (i + 0.5) / SAMPLES as f64;
    let ring = (1.0 - y * y).sqrt();
    let theta = GOLDEN_ANGLE * i;
    SpatialVector::new(ring * theta.cos(), y, ring * theta.sin())
}

/// Unit vector from `from` towards `to`, or the fallback for `seed` when
/// the points coincide.
pub fn separation_direction(from: SpatialVector, to: SpatialVector, seed: usize) -> SpatialVector {
    (to - from)
        .normalized()
        .unwrap_or_else(|| fallback_direction(seed))
}

/// Positions that push apart every pair of `map`'s references the `rule`
/// flags.
///
/// `rule` sees a pair and their current distance and returns the distance
/// they should end up at, or `None` to leave the pair alone. Each flagged
/// pair moves symmetrically, half the shortfall each, along their
/// separation. Displacements are computed from the original positions and
/// summed, so one pass is order independent. Only references that moved
/// are returned, in map order. `None` if `cancelled` fires between
/// comparisons.
pub fn pairwise_separation(
    map: &SpatialMap,
    mut rule: impl FnMut(&SpatialReference, &SpatialReference, f64) -> Option<f64>,
    cancelled: &dyn Fn() -> bool,
) -> Option<Vec<(ReferenceId, SpatialVector)>> {
    let refs: Vec<&SpatialReference> = map.references().collect();
    let mut shift = vec![SpatialVector::ZERO; refs.len()];
    let mut seed = 0;

    for i in 0..refs.len() {
        for j in i + 1..refs.len() {
            if cancelled() {
                return None;
            }
            let (a, b) = (refs[i], refs[j]);
            let distance = calculate_distance(a.position, b.position);
            let Some(target) = rule(a, b, distance) else {
                continue;
            };
            let half = (target - distance) / 2.0;
            let direction = separation_direction(a.position, b.position, seed);
            seed += 1;
            shift[i] += -direction * half;
            shift[j] += direction * half;
        }
    }

    Some(
        refs.iter()
            .zip(shift)
            .filter(|(_, d)| *d != SpatialVector::ZERO)
            .map(|(r, d)| (r.id.clone(), r.position + d))
            .collect(),
    )
}
