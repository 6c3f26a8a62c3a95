//! Benchmark profiles and utilities for the Locus spatial reference framework.
//!
//! Provides pre-populated managers for benchmarking:
//!
//! - [`reference_profile`]: 200 references with a chain of connections
//! - [`stress_profile`]: 2 000 references, for the quadratic passes
//! - [`scatter_positions`]: deterministic placement via seed

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::error::Error;

use locus_core::{
    ComplexityLevel, ConnectionOptions, MapId, ReferenceDraft, ReferenceType, RelationType,
    SpatialVector,
};
use locus_engine::{ManagerConfig, SpatialManager};

/// Error from building a profile.
pub type ProfileError = Box<dyn Error + Send + Sync>;

/// Half-width of the cube references are scattered in.
pub const SIGNING_SPACE_EXTENT: f64 = 3.0;

/// A manager holding one populated map.
pub struct Profile {
    /// The manager.
    pub manager: SpatialManager,
    /// The populated map.
    pub map_id: MapId,
}

/// Build a reference benchmark profile: 200 references, each connected to
/// the next.
pub fn reference_profile(seed: u64) -> Result<Profile, ProfileError> {
    populate(200, seed)
}

/// Build a stress benchmark profile: 2 000 references.
///
/// Same layout as [`reference_profile`] at 10x the reference count.
pub fn stress_profile(seed: u64) -> Result<Profile, ProfileError> {
    populate(2_000, seed)
}

fn populate(n: usize, seed: u64) -> Result<Profile, ProfileError> {
    let manager = SpatialManager::new(ManagerConfig::new())?;
    let map_id = manager
        .create_spatial_map("benchmark", "bench-session", ComplexityLevel::Advanced)
        .id()
        .clone();

    let mut previous = None;
    for (i, position) in scatter_positions(n, seed).into_iter().enumerate() {
        let reference_type = ReferenceType::ALL[i % ReferenceType::ALL.len()];
        let draft = ReferenceDraft::new(reference_type, position).with_id(format!("b{i}"));
        let reference = manager.add_reference(&map_id, draft)?;
        if let Some(prev) = previous.replace(reference.id.clone()) {
            manager.connect_references(
                &map_id,
                &prev,
                &reference.id,
                RelationType::Spatial,
                ConnectionOptions::default(),
            )?;
        }
    }
    Ok(Profile { manager, map_id })
}

/// Generate `n` deterministic positions inside the signing-space cube.
///
/// A simple LCG keyed by `seed`; equal seeds give equal layouts.
pub fn scatter_positions(n: usize, seed: u64) -> Vec<SpatialVector> {
    let mut state = seed;
    let mut next = || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        // Top 53 bits as a fraction in [0, 1).
        let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
        (unit * 2.0 - 1.0) * SIGNING_SPACE_EXTENT
    };
    (0..n)
        .map(|_| {
            let (x, y, z) = (next(), next(), next());
            SpatialVector::new(x, y, z)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_profile_is_populated() {
        let profile = reference_profile(42).unwrap();
        let map = profile.manager.get_spatial_map(&profile.map_id).unwrap();
        assert_eq!(map.statistics().reference_count, 200);
        assert_eq!(map.statistics().connection_count, 199);
    }

    #[test]
    fn scatter_positions_stay_in_extent() {
        let positions = scatter_positions(500, 7);
        assert_eq!(positions.len(), 500);
        for p in &positions {
            for c in [p.x, p.y, p.z] {
                assert!(c.abs() <= SIGNING_SPACE_EXTENT, "{p:?} out of bounds");
            }
        }
    }

    #[test]
    fn scatter_positions_deterministic() {
        assert_eq!(scatter_positions(50, 42), scatter_positions(50, 42));
        assert_ne!(scatter_positions(50, 42), scatter_positions(50, 43));
    }
}
