//! Reusable map fixtures.
//!
//! Drafts use caller-chosen ids so tests can refer to references by name.

use locus_core::{
    ComplexityLevel, MapContext, ReferenceDraft, ReferenceType, SpatialVector,
};

/// Context for a throwaway test session.
pub fn test_context() -> MapContext {
    MapContext::new("test topic", "test-session", ComplexityLevel::Intermediate)
}

/// A draft with a fixed id.
pub fn draft(id: &str, reference_type: ReferenceType, position: [f64; 3]) -> ReferenceDraft {
    ReferenceDraft::new(reference_type, SpatialVector::from(position)).with_id(id)
}

/// A person at `position`.
pub fn person(id: &str, position: [f64; 3]) -> ReferenceDraft {
    draft(id, ReferenceType::Person, position)
}

/// An object at `position`.
pub fn object(id: &str, position: [f64; 3]) -> ReferenceDraft {
    draft(id, ReferenceType::Object, position)
}

/// `n` objects named `r0..r{n-1}` spaced `spacing` apart along x.
pub fn row(n: usize, spacing: f64) -> Vec<ReferenceDraft> {
    (0..n)
        .map(|i| object(&format!("r{i}"), [i as f64 * spacing, 0.0, 0.0]))
        .collect()
}

/// `n` objects on a cube lattice of edge `spacing`, ids `g{i}`.
///
/// Deterministic, so benchmarks and property tests are reproducible.
pub fn lattice(n: usize, spacing: f64) -> Vec<ReferenceDraft> {
    let side = (n as f64).cbrt().ceil().max(1.0) as usize;
    (0..n)
        .map(|i| {
            let (x, y, z) = (i % side, (i / side) % side, i / (side * side));
            object(
                &format!("g{i}"),
                [x as f64 * spacing, y as f64 * spacing, z as f64 * spacing],
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_is_evenly_spaced() {
        let drafts = row(3, 0.5);
        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[2].position, SpatialVector::new(1.0, 0.0, 0.0));
        assert_eq!(drafts[1].id.as_ref().map(|id| id.as_str()), Some("r1"));
    }

    #[test]
    fn lattice_positions_are_distinct() {
        let drafts = lattice(27, 1.0);
        for (i, a) in drafts.iter().enumerate() {
            for b in &drafts[i + 1..] {
                assert!(a.position.distance_to(b.position) >= 1.0);
            }
        }
    }
}
