//! Coherence validation for Locus spatial maps.
//!
//! [`CoherenceValidator`] inspects a [`SpatialMap`](locus_core::SpatialMap)
//! snapshot for geometric conflicts (references too close together,
//! overlapping bounding volumes, connections that are too long or visually
//! blocked) and proposes corrected layouts. It never mutates its input.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod geometry;
pub mod validator;

pub use config::CoherenceConfig;
pub use error::CoherenceConfigError;
pub use geometry::calculate_distance;
pub use validator::{AdditionCheck, CoherenceValidator};
